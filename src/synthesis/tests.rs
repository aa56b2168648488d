use super::*;
use crate::corpus::DocumentRecord;
use std::sync::Mutex;

/// Captures prompts and answers with a canned reply
#[derive(Default)]
struct CapturingClient {
    prompts: Mutex<Vec<(String, GenerationOptions)>>,
}

impl GenerationClient for CapturingClient {
    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push((prompt.to_string(), *options));
        Ok("  canned answer \n".to_string())
    }
}

struct FailingClient;

impl GenerationClient for FailingClient {
    fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
        Err(RagError::GenerationService("HTTP 401".to_string()))
    }
}

fn result(rank: usize, text: &str) -> RetrievalResult {
    RetrievalResult {
        record: DocumentRecord {
            id: rank as u64,
            title: format!("doc {}", rank),
            text: text.to_string(),
            asset_paths: Vec::new(),
        },
        distance: rank as f32 * 0.1,
        rank,
    }
}

fn config(max_context_chars: usize) -> GenerationConfig {
    GenerationConfig {
        max_context_chars,
        ..GenerationConfig::default()
    }
}

#[test]
fn context_joins_with_blank_line() {
    let results = vec![result(0, "first"), result(1, "second"), result(2, "third")];
    let (context, kept) = build_context(&results, 1000);
    assert_eq!(context, "first\n\nsecond\n\nthird");
    assert_eq!(kept, 3);
}

#[test]
fn context_drops_farthest_first() {
    let results = vec![
        result(0, &"a".repeat(40)),
        result(1, &"b".repeat(40)),
        result(2, &"c".repeat(40)),
    ];

    // 40 + 2 + 40 = 82 fits, adding the third (124) does not.
    let (context, kept) = build_context(&results, 100);
    assert_eq!(kept, 2);
    assert_eq!(context, format!("{}\n\n{}", "a".repeat(40), "b".repeat(40)));

    let (context, kept) = build_context(&results, 82);
    assert_eq!(kept, 2);
    assert_eq!(context.chars().count(), 82);

    let (_, kept) = build_context(&results, 81);
    assert_eq!(kept, 1);
}

#[test]
fn context_never_cuts_a_record() {
    let results = vec![result(0, &"x".repeat(50))];
    let (context, kept) = build_context(&results, 49);
    assert_eq!(kept, 0);
    assert!(context.is_empty());
}

#[test]
fn context_counts_characters_not_bytes() {
    let results = vec![result(0, "ééééé"), result(1, "ü")];
    let (_, kept) = build_context(&results, 8);
    assert_eq!(kept, 2);
}

#[test]
fn prompt_template() {
    let prompt = build_prompt("ctx", "Where did we sail?");
    assert_eq!(
        prompt,
        "Answer the following query based on the context:\n\nContext:\nctx\n\nQuery: Where did we sail?\n\nAnswer:"
    );
}

#[test]
fn synthesize_sends_prompt_and_returns_answer_verbatim() {
    let client = Arc::new(CapturingClient::default());
    let synthesizer = AnswerSynthesizer::new(
        Arc::clone(&client) as Arc<dyn GenerationClient>,
        &config(1000),
    );
    let results = vec![result(0, "Boats in Sardinia."), result(1, "Rain in the Alps.")];

    let answer = synthesizer
        .synthesize("  What about boats?", &results)
        .expect("synthesize");
    assert_eq!(answer, "  canned answer \n");

    let prompts = client.prompts.lock().expect("lock should not be poisoned");
    assert_eq!(prompts.len(), 1);
    let (prompt, options) = &prompts[0];
    assert!(prompt.contains("Context:\nBoats in Sardinia.\n\nRain in the Alps.\n\n"));
    assert!(prompt.contains("Query:   What about boats?\n"));
    assert_eq!(options.max_tokens, 300);
    assert_eq!(options.temperature, 0.7);
}

#[test]
fn synthesize_respects_budget_and_order() {
    let client = Arc::new(CapturingClient::default());
    let synthesizer = AnswerSynthesizer::new(
        Arc::clone(&client) as Arc<dyn GenerationClient>,
        &config(30),
    );
    let results = vec![
        result(0, "closest record."),
        result(1, "middle."),
        result(2, "farthest record text."),
    ];

    synthesizer.synthesize("q", &results).expect("synthesize");

    let prompts = client.prompts.lock().expect("lock should not be poisoned");
    let prompt = &prompts[0].0;
    assert!(prompt.contains("Context:\nclosest record.\n\nmiddle.\n\nQuery: q"));
    assert!(!prompt.contains("farthest"));
}

#[test]
fn synthesize_rejects_blank_query() {
    let synthesizer = AnswerSynthesizer::new(Arc::new(CapturingClient::default()), &config(100));
    assert!(matches!(
        synthesizer.synthesize(" ", &[result(0, "text")]),
        Err(RagError::InvalidQuery(_))
    ));
}

#[test]
fn synthesize_surfaces_service_errors() {
    let synthesizer = AnswerSynthesizer::new(Arc::new(FailingClient), &config(100));
    let err = synthesizer
        .synthesize("q", &[result(0, "text")])
        .expect_err("service failure should surface");
    assert!(matches!(err, RagError::GenerationService(_)));
    assert!(err.is_retryable());
}

#[test]
fn prompt_for_matches_synthesized_prompt() {
    let client = Arc::new(CapturingClient::default());
    let synthesizer = AnswerSynthesizer::new(
        Arc::clone(&client) as Arc<dyn GenerationClient>,
        &config(1000),
    );
    let results = vec![result(0, "one"), result(1, "two")];

    let expected = synthesizer.prompt_for("q", &results);
    synthesizer.synthesize("q", &results).expect("synthesize");

    let prompts = client.prompts.lock().expect("lock should not be poisoned");
    assert_eq!(prompts[0].0, expected);
}

#[test]
fn synthesize_detailed_reports_grounding() {
    let client = Arc::new(CapturingClient::default());
    let synthesizer = AnswerSynthesizer::new(
        Arc::clone(&client) as Arc<dyn GenerationClient>,
        &config(12),
    );
    let results = vec![result(0, "0123456789"), result(1, "abcdefghij")];

    let synthesis = synthesizer
        .synthesize_detailed("q", &results)
        .expect("synthesis should succeed");
    assert_eq!(synthesis.grounded_on, 1);
    assert_eq!(synthesis.text, "  canned answer \n");

    let narrow = AnswerSynthesizer::new(
        Arc::clone(&client) as Arc<dyn GenerationClient>,
        &config(5),
    );
    let ungrounded = narrow
        .synthesize_detailed("q", &results)
        .expect("oversized records still reach the model");
    assert_eq!(ungrounded.grounded_on, 0);

    let prompts = client.prompts.lock().expect("lock should not be poisoned");
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].0.contains("Context:\n\n\nQuery: q"));
}
