//! 启发式意图分类与实体抽取（不调用后端）
//!
//! 当生成后端不可用或返回非结构化内容时，由对应工具显式走这里的关键词规则。

use std::sync::OnceLock;

use regex::Regex;

use crate::intent::types::{labels, EntityExtraction, IntentClassification};

/// 意图关键词表：(标签, 关键词)
const INTENT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        labels::WEB_SCRAPING,
        &["scrape", "scraping", "crawl", "website", "web page", "webpage", "fetch", "extract from"],
    ),
    (
        labels::SEMANTIC_SEARCH,
        &["semantic search", "similar", "embedding", "vector", "pinecone", "knowledge base"],
    ),
    (
        labels::EMAIL_AUTOMATION,
        &["email", "gmail", "inbox", "mail"],
    ),
    (
        labels::NOTIFICATION,
        &["notify", "notification", "alert", "discord", "slack", "post to"],
    ),
    (
        labels::DATA_ANALYSIS,
        &["analyze", "analyse", "analysis", "compare", "trend", "statistics", "insight"],
    ),
    (
        labels::CONTENT_GENERATION,
        &["write", "generate", "draft", "compose", "create a post", "blog"],
    ),
    (
        labels::AI_PROCESSING,
        &["summarize", "summarise", "summary", "classify", "translate", "sentiment", "llm", "ai"],
    ),
    (
        labels::DATA_STORAGE,
        &["store", "save", "database", "persist", "table"],
    ),
];

/// (关键词, AI 任务名)
const AI_TASK_KEYWORDS: &[(&str, &str)] = &[
    ("summar", "summarization"),
    ("classif", "classification"),
    ("translat", "translation"),
    ("sentiment", "sentiment_analysis"),
    ("analy", "analysis"),
    ("extract", "extraction"),
    ("generat", "generation"),
    ("write", "generation"),
    ("embed", "embedding"),
];

/// (关键词, 处理步骤名)，按在文本中出现的位置排序输出
const STEP_KEYWORDS: &[(&str, &str)] = &[
    ("scrape", "scrape"),
    ("crawl", "scrape"),
    ("fetch", "fetch"),
    ("extract", "extract"),
    ("filter", "filter"),
    ("summar", "summarize"),
    ("analy", "analyze"),
    ("translat", "translate"),
    ("classif", "classify"),
    ("compare", "compare"),
    ("store", "store"),
    ("save", "store"),
    ("send", "send"),
    ("email", "send"),
    ("notify", "notify"),
];

const DATA_TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("price", "prices"),
    ("product", "products"),
    ("article", "articles"),
    ("news", "news"),
    ("review", "reviews"),
    ("image", "images"),
    ("job", "jobs"),
    ("contact", "contacts"),
    ("headline", "headlines"),
    ("text", "text"),
];

const OUTPUT_FORMAT_KEYWORDS: &[(&str, &str)] = &[
    ("json", "json"),
    ("csv", "csv"),
    ("markdown", "markdown"),
    ("pdf", "pdf"),
    ("excel", "excel"),
    ("spreadsheet", "excel"),
    ("html", "html"),
    ("xml", "xml"),
    ("report", "report"),
];

const SITE_KEYWORDS: &[&str] = &[
    "amazon", "reddit", "twitter", "linkedin", "github", "youtube", "wikipedia", "hacker news",
];

const SOURCE_KEYWORDS: &[(&str, &str)] = &[
    ("database", "database"),
    ("api", "api"),
    ("csv file", "csv_file"),
    ("rss", "rss"),
    ("gmail", "email"),
    ("inbox", "email"),
    ("pdf", "document"),
    ("spreadsheet", "spreadsheet"),
];

static URL_RE: OnceLock<Regex> = OnceLock::new();

fn url_regex() -> &'static Regex {
    URL_RE.get_or_init(|| Regex::new(r#"https?://[^\s"'<>()\[\]]+"#).unwrap())
}

/// 判断关键词是否出现；短关键词（如 "ai"、"api"）要求整词匹配，避免误中 "email"、"rapid"
fn contains_keyword(text: &str, keyword: &str) -> bool {
    if keyword.len() > 3 {
        return text.contains(keyword);
    }
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| word == keyword)
}

/// 关键词打分分类：得分最高的标签胜出，同分取表中靠前者；含 URL 时额外加分给网页抓取
pub fn classify_intent(input: &str) -> IntentClassification {
    let text = input.to_lowercase();
    let has_url = url_regex().is_match(&text);

    let mut best: Option<(&str, usize)> = None;
    let mut matched_labels = Vec::new();
    for (label, keywords) in INTENT_KEYWORDS {
        let mut score = keywords.iter().filter(|k| contains_keyword(&text, k)).count();
        if has_url && *label == labels::WEB_SCRAPING {
            score += 1;
        }
        if score == 0 {
            continue;
        }
        matched_labels.push(*label);
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((*label, score));
        }
    }

    match best {
        Some((label, score)) => IntentClassification {
            intent: label.to_string(),
            confidence: (0.5 + 0.1 * score as f64).min(0.9),
            reasoning: format!(
                "Keyword match (score {}); matched intents: {}",
                score,
                matched_labels.join(", ")
            ),
        },
        None => IntentClassification {
            intent: labels::GENERAL_AUTOMATION.to_string(),
            confidence: 0.4,
            reasoning: "No specific keywords matched; defaulting to general automation".to_string(),
        },
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// 去掉 URL 末尾的标点
fn clean_url(raw: &str) -> String {
    raw.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
        .to_string()
}

fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, r)| r)?;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    (!host.is_empty()).then(|| host.to_string())
}

/// 规则抽取实体；URL 保持原始大小写，其余按小写文本匹配
pub fn extract_entities(input: &str) -> EntityExtraction {
    let text = input.to_lowercase();
    let mut entities = EntityExtraction::default();

    for m in url_regex().find_iter(input) {
        let url = clean_url(m.as_str());
        if let Some(host) = host_of(&url) {
            push_unique(&mut entities.target_sites, &host);
        }
        entities.urls.push(url);
    }
    for site in SITE_KEYWORDS {
        if contains_keyword(&text, site) {
            push_unique(&mut entities.target_sites, site);
        }
    }

    for (keyword, name) in DATA_TYPE_KEYWORDS {
        if contains_keyword(&text, keyword) {
            push_unique(&mut entities.data_types, name);
        }
    }
    for (keyword, name) in OUTPUT_FORMAT_KEYWORDS {
        if contains_keyword(&text, keyword) {
            push_unique(&mut entities.output_formats, name);
        }
    }
    for (keyword, name) in AI_TASK_KEYWORDS {
        if text.contains(keyword) {
            push_unique(&mut entities.ai_tasks, name);
        }
    }

    let mut steps: Vec<(usize, &str)> = STEP_KEYWORDS
        .iter()
        .filter_map(|(keyword, name)| text.find(keyword).map(|pos| (pos, *name)))
        .collect();
    steps.sort_by_key(|(pos, _)| *pos);
    for (_, name) in steps {
        push_unique(&mut entities.processing_steps, name);
    }

    if !entities.urls.is_empty() {
        push_unique(&mut entities.data_sources, "website");
    }
    for (keyword, name) in SOURCE_KEYWORDS {
        if contains_keyword(&text, keyword) {
            push_unique(&mut entities.data_sources, name);
        }
    }

    entities
}

/// 启发式抽取结果的置信度：抽到的实体越多越可信
pub fn extraction_confidence(entities: &EntityExtraction) -> f64 {
    match entities.total() {
        0 => 0.3,
        1..=2 => 0.5,
        3..=5 => 0.65,
        _ => 0.75,
    }
}
