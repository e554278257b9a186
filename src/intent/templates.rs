//! 模板化工作流生成
//!
//! 根据意图标签与抽取到的实体拼出一条从输入到输出的路径；
//! 多个抓取目标时生成 fork-join 结构（并行抓取后汇合）。

use serde_json::json;

use crate::intent::types::{labels, EntityExtraction};
use crate::workflow::{Node, NodeType, TopologyKind, WorkflowBuilder, WorkflowStructure};

/// 同一工作流最多并行抓取的站点数
const MAX_SCRAPERS: usize = 3;

fn llm_prompt(task: &str) -> String {
    match task {
        "summarization" => "Summarize the following content concisely:\n\n{{input}}".to_string(),
        "classification" => "Classify the following content into categories:\n\n{{input}}".to_string(),
        "translation" => "Translate the following content into English:\n\n{{input}}".to_string(),
        "sentiment_analysis" => "Determine the sentiment of the following content:\n\n{{input}}".to_string(),
        "analysis" => "Analyze the following content and list key insights:\n\n{{input}}".to_string(),
        "extraction" => "Extract the key facts from the following content:\n\n{{input}}".to_string(),
        "generation" => "Write new content based on the following material:\n\n{{input}}".to_string(),
        other => format!("Perform the task '{}' on the following content:\n\n{{{{input}}}}", other),
    }
}

fn task_label(task: &str) -> String {
    let mut chars = task.replace('_', " ").chars().collect::<Vec<_>>();
    if let Some(first) = chars.first_mut() {
        *first = first.to_ascii_uppercase();
    }
    chars.into_iter().collect()
}

/// 生成模板工作流
pub fn template_workflow(intent: &str, entities: &EntityExtraction) -> WorkflowStructure {
    let mut builder = WorkflowBuilder::new().node(
        Node::new("input", NodeType::DataInput, "User Input").with_config(
            "source",
            if entities.urls.is_empty() { "user" } else { "urls" },
        ),
    );
    if !entities.urls.is_empty() {
        builder = builder.config("urls", json!(entities.urls));
    }

    // 抓取段：每个 URL 一个抓取节点；无 URL 但意图为抓取时用占位符
    let wants_scrape = intent == labels::WEB_SCRAPING || !entities.urls.is_empty();
    let mut tails: Vec<String> = vec!["input".to_string()];
    let mut fork = false;
    if wants_scrape {
        let targets: Vec<String> = if entities.urls.is_empty() {
            vec!["{{url}}".to_string()]
        } else {
            entities.urls.iter().take(MAX_SCRAPERS).cloned().collect()
        };
        fork = targets.len() > 1;
        let mut scrapers = Vec::new();
        for (i, url) in targets.iter().enumerate() {
            let id = format!("scrape_{}", i + 1);
            let mut node = Node::new(&id, NodeType::WebScraping, format!("Scrape {}", url))
                .with_config("url", url.as_str());
            if !entities.data_types.is_empty() {
                node = node.with_config("extract", json!(entities.data_types));
            }
            builder = builder.node(node).edge("input", id.clone());
            scrapers.push(id);
        }
        tails = scrapers;
    }

    let link = |builder: WorkflowBuilder, node: Node, tails: &mut Vec<String>| {
        let id = node.id.clone();
        let mut builder = builder.node(node);
        for tail in tails.iter() {
            builder = builder.edge(tail.clone(), id.clone());
        }
        *tails = vec![id];
        builder
    };

    if intent == labels::SEMANTIC_SEARCH {
        builder = link(
            builder,
            Node::new("embed", NodeType::EmbeddingGenerator, "Generate Embeddings")
                .with_config("model", "text-embedding-3-small"),
            &mut tails,
        );
        builder = link(
            builder,
            Node::new("search", NodeType::SimilaritySearch, "Similarity Search").with_config("topK", 5),
            &mut tails,
        );
    }

    let mut ai_tasks: Vec<&str> = entities
        .ai_tasks
        .iter()
        .map(String::as_str)
        .filter(|t| *t != "embedding")
        .collect();
    if ai_tasks.is_empty()
        && matches!(
            intent,
            labels::AI_PROCESSING | labels::CONTENT_GENERATION | labels::DATA_ANALYSIS
        )
    {
        ai_tasks.push(match intent {
            labels::CONTENT_GENERATION => "generation",
            labels::DATA_ANALYSIS => "analysis",
            _ => "summarization",
        });
    }
    for (i, task) in ai_tasks.iter().enumerate() {
        builder = link(
            builder,
            Node::new(format!("llm_{}", i + 1), NodeType::LlmTask, task_label(task))
                .with_config("prompt", llm_prompt(task))
                .with_config("task", *task),
            &mut tails,
        );
    }

    if entities.output_formats.iter().any(|f| f == "json") && !ai_tasks.is_empty() {
        builder = link(
            builder,
            Node::new("structure", NodeType::StructuredOutput, "Structure Results")
                .with_config("schema", json!({ "type": "object" })),
            &mut tails,
        );
    }

    if intent == labels::DATA_STORAGE {
        builder = link(
            builder,
            Node::new("store", NodeType::Database, "Store Results").with_config("table", "results"),
            &mut tails,
        );
    }
    if intent == labels::EMAIL_AUTOMATION {
        builder = link(
            builder,
            Node::new("email", NodeType::Gmail, "Send Email").with_config("to", "{{recipient}}"),
            &mut tails,
        );
    }
    if intent == labels::NOTIFICATION {
        builder = link(
            builder,
            Node::new("notify", NodeType::Discord, "Send Notification")
                .with_config("channel", "{{channel}}"),
            &mut tails,
        );
    }

    let format = entities
        .output_formats
        .first()
        .cloned()
        .unwrap_or_else(|| "json".to_string());
    builder = link(
        builder,
        Node::new("output", NodeType::DataOutput, "Output").with_config("format", format),
        &mut tails,
    );

    let kind = if fork {
        TopologyKind::ForkJoin
    } else {
        TopologyKind::Linear
    };
    builder.topology(kind, fork).build()
}
