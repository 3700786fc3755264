//! Scratch file lifecycle: present during an attempt, absent afterwards, on
//! every exit path: success, transport failure, and caller cancellation at
//! randomized points.

mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;

use ai_gateway::config::OrchestratorLimits;
use ai_gateway::error::GatewayError;
use ai_gateway::orchestrator::Gateway;
use ai_gateway::registry::ProviderRegistry;
use ai_gateway::types::GenerationRequest;

use support::*;

fn no_jitter() -> OrchestratorLimits {
    OrchestratorLimits {
        fallback_jitter_ms: 0,
        ..OrchestratorLimits::default()
    }
}

fn transcribe_request() -> GenerationRequest {
    GenerationRequest::transcribe(vec![0u8; 64], "audio/wav")
}

#[tokio::test]
async fn scratch_file_released_after_successful_attempt() {
    let (probe, seen) = ScratchProbe::new("stt", ProbeMode::Complete("transcript"));
    let mut registry = ProviderRegistry::new();
    registry.register(sync_descriptor("stt", 1, stt_caps()), Arc::new(probe));
    let gateway = Gateway::with_registry(registry, no_jitter());

    let response = gateway.generate(transcribe_request()).await.expect("response");
    assert_eq!(response.content, "transcript");

    let observations = seen.lock().unwrap().clone();
    assert_eq!(observations.len(), 1);
    assert!(observations[0].existed, "file must exist during the attempt");
    assert!(
        !observations[0].path.exists(),
        "file must be gone after the attempt"
    );
}

#[tokio::test]
async fn fallback_materializes_a_fresh_file_per_attempt() {
    let (failing, seen_first) = ScratchProbe::new("stt-a", ProbeMode::FailTransport);
    let (healthy, seen_second) = ScratchProbe::new("stt-b", ProbeMode::Complete("ok"));
    let mut registry = ProviderRegistry::new();
    registry.register(sync_descriptor("stt-a", 1, stt_caps()), Arc::new(failing));
    registry.register(sync_descriptor("stt-b", 2, stt_caps()), Arc::new(healthy));
    let gateway = Gateway::with_registry(registry, no_jitter());

    let response = gateway.generate(transcribe_request()).await.expect("response");
    assert_eq!(response.content, "ok");

    let first = seen_first.lock().unwrap().clone();
    let second = seen_second.lock().unwrap().clone();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!(first[0].existed);
    assert!(second[0].existed);
    // Never the same materialization across attempts.
    assert_ne!(first[0].path, second[0].path);
    assert!(!first[0].path.exists());
    assert!(!second[0].path.exists());
}

#[tokio::test]
async fn cancellation_at_random_points_always_releases_the_file() {
    let (probe, seen) = ScratchProbe::new("stt", ProbeMode::Hang);
    let mut registry = ProviderRegistry::new();
    registry.register(sync_descriptor("stt", 1, stt_caps()), Arc::new(probe));
    let gateway = Gateway::with_registry(registry, no_jitter());

    for trial in 0..25 {
        seen.lock().unwrap().clear();
        let handle = gateway.submit(transcribe_request()).expect("submit");
        let cancel = handle.cancel.clone();
        let mut stream = handle.stream;
        let consumer = tokio::spawn(async move {
            let first = stream.next().await;
            (first, stream)
        });

        let pause = rand::thread_rng().gen_range(0..15u64);
        tokio::time::sleep(Duration::from_millis(pause)).await;
        cancel.cancel();

        let (first, stream) = consumer.await.expect("consumer task");
        assert!(first.is_none(), "cancelled stream yields nothing");
        // Dropping the stream tears down the in-flight attempt.
        drop(stream);

        let observations = seen.lock().unwrap().clone();
        match observations.as_slice() {
            [] => {
                // Cancelled before the attempt dispatched; nothing was
                // materialized, so there is nothing to leak.
            }
            [obs] => {
                assert!(obs.existed, "trial {trial}: file missing during attempt");
                assert!(
                    !obs.path.exists(),
                    "trial {trial}: file leaked after cancellation"
                );
            }
            more => panic!("trial {trial}: more than one attempt dispatched: {more:?}"),
        }
    }
}

#[tokio::test]
async fn dropping_the_stream_without_cancel_also_releases() {
    let (probe, seen) = ScratchProbe::new("stt", ProbeMode::Hang);
    let mut registry = ProviderRegistry::new();
    registry.register(sync_descriptor("stt", 1, stt_caps()), Arc::new(probe));
    let gateway = Gateway::with_registry(registry, no_jitter());

    let handle = gateway.submit(transcribe_request()).expect("submit");
    let mut stream = handle.stream;
    // Poll once so the attempt dispatches and materializes its file.
    let poll = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
    assert!(poll.is_err(), "hanging probe must not produce output");
    drop(stream);

    let observations = seen.lock().unwrap().clone();
    assert_eq!(observations.len(), 1);
    assert!(observations[0].existed);
    assert!(!observations[0].path.exists());
}

#[tokio::test]
async fn text_payload_with_file_backed_provider_fails_over_cleanly() {
    // A chat request routed to a provider that demands a scratch file is an
    // attempt failure, not a crash; with no other candidates it exhausts.
    let (probe, seen) = ScratchProbe::new("stt", ProbeMode::Complete("unused"));
    let mut registry = ProviderRegistry::new();
    registry.register(sync_descriptor("stt", 1, chat_caps()), Arc::new(probe));
    let gateway = Gateway::with_registry(registry, no_jitter());

    let err = gateway
        .generate(GenerationRequest::chat("not audio"))
        .await
        .expect_err("exhausted");
    assert!(matches!(err, GatewayError::AllProvidersExhausted { .. }));
    assert!(seen.lock().unwrap().is_empty());
}
