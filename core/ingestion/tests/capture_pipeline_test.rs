use anyhow::Result;
use devmem_ingestion::{
    CaptureConfig, CaptureRequest, ContentAnalyzer, ContextQuery, InMemoryStore, ListRecord,
    MemoryCapture, MemoryStore, TagGenerator,
};
use devmem_schemas::{Intent, Outcome, SourceKind};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

const AUTH_SNIPPET: &str = r#"async function refreshSession(token) {
  try {
    const response = await fetch('/api/auth/refresh', { headers: { Authorization: token } });
    return await response.json();
  } catch (error) {
    console.error('refresh failed', error);
  }
}"#;

#[tokio::test]
async fn test_capture_then_retrieve() -> Result<()> {
    println!("=== Capture pipeline ===\n");

    let store = Arc::new(InMemoryStore::default());
    let capture = MemoryCapture::new(store.clone(), CaptureConfig::default());

    println!("Step 1: manual capture with generated tags");
    let outcome = capture
        .capture(CaptureRequest {
            content: AUTH_SNIPPET.to_string(),
            file: Some("src/session.ts".to_string()),
            line: Some(12),
            language: Some("typescript".to_string()),
            project: Some("Authentication Service".to_string()),
            ..Default::default()
        })
        .await;

    let memory = match outcome {
        Outcome::Fresh(memory) => memory,
        other => anyhow::bail!("expected a fresh capture, got {:?}", other),
    };
    assert_eq!(memory.title, "Code from session.ts:12");
    assert_eq!(&memory.tags[..2], &["typescript".to_string(), "frontend".to_string()]);
    assert!(memory.tags.contains(&"authentication".to_string()));
    assert!(memory.tags.contains(&"async".to_string()));
    println!("  ✓ captured {} with tags {:?}", memory.id, memory.tags);

    println!("Step 2: the analyzer sees the same concerns as the tagger");
    let signals = ContentAnalyzer::new().analyze(AUTH_SNIPPET, Some("typescript"));
    assert!(signals.intents.contains(&Intent::Authentication));
    assert!(signals.intents.contains(&Intent::ApiIntegration));
    assert!(signals.identifiers.contains(&"refreshSession".to_string()));

    println!("Step 3: contextual retrieval finds the capture");
    let candidates = store
        .contextual_candidates(&ContextQuery {
            content: "await fetch('/api/auth/refresh') with the session token".to_string(),
            language: Some("typescript".to_string()),
            filename: Some("src/login.ts".to_string()),
            limit: 5,
        })
        .await?;
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].memory.id, memory.id);

    println!("\n=== Capture pipeline passed ===");
    Ok(())
}

#[tokio::test]
async fn test_list_records_become_insights() -> Result<()> {
    let store = Arc::new(InMemoryStore::default());
    let tagger = TagGenerator::new();

    let rows = vec![
        json!({
            "Title": "Adopt JWT for service auth",
            "Decision": "Approved: rotate tokens every 15 minutes and hash refresh tokens at rest",
            "Owner": "platform-team",
        }),
        json!({ "Title": "Lunch" }),
    ];

    let mut created = Vec::new();
    for row in rows {
        let fields: BTreeMap<String, serde_json::Value> = serde_json::from_value(row)?;
        let record = ListRecord::from_fields(fields);
        let decision = record.is_decision_record();

        if let Some(draft) = record.into_draft("Platform", &tagger) {
            assert!(decision);
            created.push(store.create_memory(&draft).await?);
        }
    }

    assert_eq!(created.len(), 1);
    let memory = &created[0];
    assert_eq!(memory.source.kind, SourceKind::ListItem);
    assert!(memory.tags.contains(&"authentication".to_string()));
    assert!(memory.tags.contains(&"security".to_string()));
    assert!(!memory.content.contains("platform-team"));

    Ok(())
}

#[tokio::test]
async fn test_capture_survives_store_outage() -> Result<()> {
    let store = Arc::new(InMemoryStore::default());
    store.set_available(false);

    let capture = MemoryCapture::new(
        store.clone(),
        CaptureConfig {
            auto_capture: true,
            ..Default::default()
        },
    );

    let content = AUTH_SNIPPET.repeat(2);
    let outcome = capture
        .auto_capture_on_save("src/session.ts", "typescript", &content, None)
        .await;

    let memory = match outcome {
        Some(Outcome::Degraded { value, reason }) => {
            assert!(reason.contains("unavailable"));
            value
        }
        other => anyhow::bail!("expected a degraded capture, got {:?}", other),
    };

    assert_eq!(memory.project, "Unknown");
    assert!(memory.tags.contains(&"auto-captured".to_string()));
    assert!(memory.tags.contains(&"typescript".to_string()));
    assert!(store.snapshot().is_empty());

    Ok(())
}
