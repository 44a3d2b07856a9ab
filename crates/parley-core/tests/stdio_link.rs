//! `StdioTransport` 越しに worker を動かすシナリオ

use parley_core::domain::{Envelope, ErrorCode, InvocationId};
use parley_core::impls::StdioTransport;
use parley_core::sample::RunProgram;
use parley_core::{Worker, WorkerBuilder, WorkerConfig};

fn worker(max_frame_bytes: usize) -> Worker {
    WorkerBuilder::new()
        .export(RunProgram)
        .unwrap()
        .config(WorkerConfig {
            max_frame_bytes,
            ..WorkerConfig::default()
        })
        .build()
        .unwrap()
}

/// Run the worker over `input` and decode everything it wrote.
async fn serve(worker: &mut Worker, input: &[u8]) -> Vec<Envelope> {
    let mut transport = StdioTransport::new(input, Vec::new(), worker.config().max_frame_bytes);
    worker.run(&mut transport).await.unwrap();
    let (_, written) = transport.into_parts();
    String::from_utf8(written)
        .unwrap()
        .lines()
        .map(|line| Envelope::decode(line).unwrap())
        .collect()
}

fn is_malformed(envelope: &Envelope) -> bool {
    matches!(
        envelope,
        Envelope::Error {
            invocation_id: None,
            correlation_id: None,
            code: ErrorCode::MalformedEnvelope,
            ..
        }
    )
}

fn is_unknown_export(envelope: &Envelope, id: u64) -> bool {
    matches!(
        envelope,
        Envelope::Error { invocation_id: Some(inv), code: ErrorCode::UnknownExport, .. }
            if *inv == InvocationId::new(id)
    )
}

#[tokio::test]
async fn invalid_utf8_line_does_not_end_the_link() {
    let mut worker = worker(1024);
    let input: &[u8] = b"\xff\xfe garbage\n\
        {\"kind\":\"invoke\",\"invocationId\":1,\"functionName\":\"nope\"}\n\
        {\"kind\":\"shutdown\"}\n";

    let sent = serve(&mut worker, input).await;

    assert_eq!(sent.len(), 3, "{sent:?}");
    assert!(matches!(sent[0], Envelope::Ready { .. }));
    assert!(is_malformed(&sent[1]), "{:?}", sent[1]);
    assert!(is_unknown_export(&sent[2], 1), "{:?}", sent[2]);
}

#[tokio::test]
async fn oversized_line_does_not_end_the_link() {
    let mut worker = worker(128);
    let mut input = vec![b'x'; 64 * 1024];
    input.extend_from_slice(
        b"\n{\"kind\":\"invoke\",\"invocationId\":2,\"functionName\":\"nope\"}\n{\"kind\":\"shutdown\"}\n",
    );

    let sent = serve(&mut worker, &input).await;

    assert_eq!(sent.len(), 3, "{sent:?}");
    assert!(is_malformed(&sent[1]), "{:?}", sent[1]);
    assert!(is_unknown_export(&sent[2], 2), "{:?}", sent[2]);
}
