use super::*;

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        host: "test-host".to_string(),
        port: 1234,
        embedding_model: "test-model".to_string(),
        batch_size: 128,
        embedding_dimension: 768,
        retry_attempts: 2,
        ..OllamaConfig::default()
    };
    let client = OllamaEmbedder::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.dimension(), 768);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, 2);
}

#[test]
fn client_builder_methods() {
    let client = OllamaEmbedder::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);
    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);
}

#[test]
fn blank_text_rejected_before_any_request() {
    // Nothing listens on this port; a request would surface as ModelUnavailable.
    let config = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..OllamaConfig::default()
    };
    let client = OllamaEmbedder::new(&config)
        .expect("Failed to create client")
        .with_retry_attempts(1);

    let err = client
        .embed(&["ok".to_string(), " \n".to_string()])
        .expect_err("blank input should be rejected");
    assert!(matches!(err, RagError::EmptyInput { position: 1 }));
}

#[test]
fn empty_batch_is_a_no_op() {
    let client = OllamaEmbedder::new(&OllamaConfig::default()).expect("Failed to create client");
    let vectors = client.embed(&[]).expect("empty batch should succeed");
    assert!(vectors.is_empty());
}

#[test]
fn unreachable_server_is_model_unavailable() {
    let config = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..OllamaConfig::default()
    };
    let client = OllamaEmbedder::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(2))
        .with_retry_attempts(1);

    let err = client
        .embed_one("hello")
        .expect_err("nothing listens on the discard port");
    assert!(err.is_retryable(), "unexpected error: {:?}", err);
}
