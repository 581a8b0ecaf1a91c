//! Gateway and embedder tests against a local mock HTTP server.

use std::sync::Arc;

use novel_muse::config::{Config, EmbeddingConfig, GenerationConfig};
use novel_muse::db;
use novel_muse::embedding::OpenAiEmbedder;
use novel_muse::gateway::OpenAiGateway;
use novel_muse::migrate;
use novel_muse::novels::{NovelService, SettingsPatch};
use novel_muse::sqlite_store::SqliteStore;
use novel_muse_core::embedding::{Embedder, HashEmbedder};
use novel_muse_core::gateway::{GenerationGateway, ModelConfig};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generation_config(server: &MockServer) -> GenerationConfig {
    GenerationConfig {
        base_url: server.uri(),
        ..GenerationConfig::default()
    }
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    }))
}

// ============ Gateway ============

#[tokio::test]
async fn test_builtin_endpoint_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-env"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "temperature": 0.7,
            "messages": [{ "role": "user", "content": "写一段开头" }]
        })))
        .respond_with(completion("夜色如墨。"))
        .expect(1)
        .mount(&server)
        .await;

    let gw =
        OpenAiGateway::with_default_key(&generation_config(&server), Some("sk-env".to_string()))
            .unwrap();
    let out = gw.complete("写一段开头", &ModelConfig::default()).await.unwrap();
    assert_eq!(out, "夜色如墨。");
}

#[tokio::test]
async fn test_user_endpoint_overrides_builtin() {
    let builtin = MockServer::start().await;
    let user = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-user"))
        .and(body_partial_json(json!({ "model": "gpt-4" })))
        .respond_with(completion("user"))
        .expect(1)
        .mount(&user)
        .await;
    Mock::given(method("POST"))
        .respond_with(completion("builtin"))
        .expect(0)
        .mount(&builtin)
        .await;

    let gw =
        OpenAiGateway::with_default_key(&generation_config(&builtin), Some("sk-env".to_string()))
            .unwrap();
    let model = ModelConfig {
        api_key: Some("sk-user".to_string()),
        base_url: Some(user.uri()),
        model: None,
    };
    assert_eq!(gw.complete("p", &model).await.unwrap(), "user");
}

#[tokio::test]
async fn test_non_success_carries_status_and_body_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let gw = OpenAiGateway::with_default_key(&generation_config(&server), Some("k".to_string()))
        .unwrap();
    let err = gw.complete("p", &ModelConfig::default()).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("503"), "{}", msg);
    assert!(msg.contains("overloaded"), "{}", msg);
}

// ============ Embedder ============

fn embedding_config(server: &MockServer, dims: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "openai".to_string(),
        model: Some("text-embedding-3-small".to_string()),
        dims,
        url: server.uri(),
        max_retries: 0,
        ..EmbeddingConfig::default()
    }
}

#[tokio::test]
async fn test_embedder_batches_and_orders_by_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-embed"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": ["甲", "乙"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0, 0.0] },
                { "index": 0, "embedding": [1.0, 0.0, 0.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedder::with_api_key(&embedding_config(&server, 3), "sk-embed").unwrap();
    let vectors = embedder
        .embed_batch(&["甲".to_string(), "乙".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn test_embedder_rejects_wrong_dimension() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [1.0, 0.0] }]
        })))
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedder::with_api_key(&embedding_config(&server, 3), "k").unwrap();
    let err = embedder.embed("甲").await.unwrap_err();
    assert!(err.to_string().contains("expected 3"), "{}", err);
}

#[tokio::test]
async fn test_embedder_client_error_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let config = EmbeddingConfig {
        max_retries: 3,
        ..embedding_config(&server, 3)
    };
    let embedder = OpenAiEmbedder::with_api_key(&config, "k").unwrap();
    let err = embedder.embed("甲").await.unwrap_err();
    assert!(err.to_string().contains("401"), "{}", err);
}

#[tokio::test]
async fn test_embedder_retries_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.6, 0.8] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = EmbeddingConfig {
        max_retries: 1,
        ..embedding_config(&server, 2)
    };
    let embedder = OpenAiEmbedder::with_api_key(&config, "k").unwrap();
    assert_eq!(embedder.embed("甲").await.unwrap(), vec![0.6, 0.8]);
}

// ============ Generation through the service ============

async fn service_with_gateway(server: &MockServer) -> (TempDir, NovelService) {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::with_db_path(tmp.path().join("muse.sqlite"));
    config.generation = generation_config(server);

    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    let gateway =
        OpenAiGateway::with_default_key(&config.generation, Some("sk-env".to_string())).unwrap();
    let svc = NovelService::with_parts(
        config,
        SqliteStore::new(pool),
        Arc::new(HashEmbedder::default()),
        Arc::new(gateway),
    );
    (tmp, svc)
}

#[tokio::test]
async fn test_generate_outline_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("第 2 章"))
        .and(body_string_contains("[相关片段 1]"))
        .respond_with(completion(
            "【章节主题】\n重逢\n【情节框架】\n雨夜客栈\n【关键冲突】\n旧账\n【人物互动】\n对饮",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (_tmp, svc) = service_with_gateway(&server).await;
    let novel = svc.create_novel("长夜将明", None).await.unwrap();
    let ch = svc
        .create_chapter(novel.id, 1, "初入江湖", "少年背剑出山门，一路向南。")
        .await
        .unwrap();
    svc.reindex_chapter(ch.id).await.unwrap();

    let parsed = svc.generate_outline(novel.id, 2).await.unwrap();
    assert!(!parsed.is_partial());
    assert_eq!(parsed.outline.theme, "重逢");
    assert_eq!(parsed.outline.interactions, "对饮");
    svc.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_expand_outline_uses_stored_style_and_target() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("古典雅致"))
        .and(body_string_contains("2500"))
        .respond_with(completion("风起青萍之末 wind rises"))
        .expect(1)
        .mount(&server)
        .await;

    let (_tmp, svc) = service_with_gateway(&server).await;
    let novel = svc.create_novel("长夜将明", None).await.unwrap();
    svc.update_settings(SettingsPatch {
        writing_style: Some("古典雅致".to_string()),
        ..SettingsPatch::default()
    })
    .await
    .unwrap();

    let expansion = svc
        .expand_outline(novel.id, "【章节主题】\n起风", Some(2500))
        .await
        .unwrap();
    assert_eq!(expansion.content, "风起青萍之末 wind rises");
    assert_eq!(expansion.word_count, 6 + 2);
    svc.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_generation_without_any_key_fails() {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("muse.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    let gateway = OpenAiGateway::with_default_key(&config.generation, None).unwrap();
    let svc = NovelService::with_parts(
        config,
        SqliteStore::new(pool),
        Arc::new(HashEmbedder::default()),
        Arc::new(gateway),
    );

    let novel = svc.create_novel("n", None).await.unwrap();
    let err = svc.generate_outline(novel.id, 1).await.unwrap_err();
    assert!(format!("{:#}", err).contains("OPENAI_API_KEY"), "{:#}", err);
    svc.shutdown().await.unwrap();
}
