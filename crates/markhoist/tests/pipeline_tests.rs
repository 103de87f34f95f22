//! Integration tests for the markhoist pipeline

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use markhoist::*;

/// Upload stub that mints a CDN URL per name and can be told to fail some
struct StubClient {
    fail_for: Vec<String>,
    calls: AtomicUsize,
}

impl StubClient {
    fn new() -> Self {
        Self {
            fail_for: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_for(names: &[&str]) -> Self {
        Self {
            fail_for: names.iter().map(|n| n.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StorageClient for StubClient {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn upload(&self, _data: &[u8], logical_name: &str) -> std::result::Result<String, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.iter().any(|n| n == logical_name) {
            return Err(UploadError::Status {
                status: 403,
                body: "quota exceeded".into(),
            });
        }
        Ok(format!("https://cdn.example/{logical_name}"))
    }
}

/// Buffer wrapper that counts mutations, for abort/cancel assertions
struct CountingBuffer {
    inner: MemoryBuffer,
    replace_calls: Arc<AtomicUsize>,
}

impl CountingBuffer {
    fn new(contents: &str, replace_calls: Arc<AtomicUsize>) -> Self {
        Self {
            inner: MemoryBuffer::new("doc.md", contents),
            replace_calls,
        }
    }
}

impl TextBuffer for CountingBuffer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn line_count(&self) -> usize {
        self.inner.line_count()
    }

    fn line_start_offset(&self, line: usize) -> usize {
        self.inner.line_start_offset(line)
    }

    fn line_end_offset(&self, line: usize) -> usize {
        self.inner.line_end_offset(line)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn text(&self, range: std::ops::Range<usize>) -> String {
        self.inner.text(range)
    }

    fn replace(&mut self, range: std::ops::Range<usize>, text: &str) {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.replace(range, text);
    }
}

fn parse_buffer(name: &str, contents: &str) -> Vec<ImageReference> {
    contents
        .split('\n')
        .enumerate()
        .filter_map(|(line_number, line)| parse_line(name, line, line_number))
        .collect()
}

#[tokio::test]
async fn end_to_end_upload_rewrites_the_line() {
    let contents = "![demo](demo.png)";
    let buffer = Arc::new(Mutex::new(MemoryBuffer::new("doc.md", contents)));
    let refs = parse_buffer("doc.md", contents);
    assert_eq!(refs.len(), 1);

    let resolver = MemoryResolver::new();
    resolver.insert("demo.png", vec![0x89, 0x50, 0x4e, 0x47]);

    let mut ctx = PipelineContext::new("upload").with_client(Arc::new(StubClient::new()));
    ctx.add_group(buffer.clone(), refs);
    ctx.resolve_local(&resolver).await;

    let report = run(&mut ctx, &upload_workflow()).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(
        report.summary,
        RunSummary {
            processed: 1,
            failed: 0,
            not_found_names: vec![],
        }
    );
    assert_eq!(
        buffer.lock().unwrap().contents(),
        "![demo](https://cdn.example/demo.png)"
    );
}

#[tokio::test]
async fn two_marks_in_one_buffer_both_rewrite_correctly() {
    // The first rewrite grows the line it is on; descending-order write-back
    // keeps the other mark's offsets valid.
    let contents = "intro\n![a](a.png)\nmiddle\n  ![b](b.png)";
    let buffer = Arc::new(Mutex::new(MemoryBuffer::new("doc.md", contents)));
    let refs = parse_buffer("doc.md", contents);
    assert_eq!(refs.len(), 2);

    let resolver = MemoryResolver::new();
    resolver.insert("a.png", vec![1]);
    resolver.insert("b.png", vec![2]);

    let mut ctx = PipelineContext::new("upload").with_client(Arc::new(StubClient::new()));
    ctx.add_group(buffer.clone(), refs);
    ctx.resolve_local(&resolver).await;

    let report = run(&mut ctx, &upload_workflow()).await;

    assert_eq!(report.summary.processed, 2);
    assert_eq!(
        buffer.lock().unwrap().contents(),
        "intro\n![a](https://cdn.example/a.png)\nmiddle\n  ![b](https://cdn.example/b.png)"
    );
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn missing_client_aborts_before_any_mutation() {
    let contents = "![demo](demo.png)";
    let replace_calls = Arc::new(AtomicUsize::new(0));
    let buffer = Arc::new(Mutex::new(CountingBuffer::new(
        contents,
        replace_calls.clone(),
    )));
    let refs = parse_buffer("doc.md", contents);

    let mut ctx = PipelineContext::new("upload");
    ctx.add_group(buffer, refs);

    let report = run(&mut ctx, &upload_workflow()).await;

    assert!(matches!(report.outcome, RunOutcome::Aborted(_)));
    assert_eq!(replace_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn one_failing_upload_does_not_stop_the_others() {
    let contents = "![good](good.png)\n![bad](bad.png)";
    let buffer = Arc::new(Mutex::new(MemoryBuffer::new("doc.md", contents)));
    let refs = parse_buffer("doc.md", contents);

    let resolver = MemoryResolver::new();
    resolver.insert("good.png", vec![1]);
    resolver.insert("bad.png", vec![2]);

    let mut ctx = PipelineContext::new("upload")
        .with_client(Arc::new(StubClient::failing_for(&["bad.png"])));
    ctx.add_group(buffer.clone(), refs);
    ctx.resolve_local(&resolver).await;

    let report = run(&mut ctx, &upload_workflow()).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.processed, 1);
    assert_eq!(report.summary.failed, 1);
    assert!(report.summary.not_found_names.is_empty());
    // The failed mark is untouched, the good one is rewritten.
    assert_eq!(
        buffer.lock().unwrap().contents(),
        "![good](https://cdn.example/good.png)\n![bad](bad.png)"
    );
    // The raw backend message is preserved on the recorded failure.
    assert!(ctx.failures()[0].to_string().contains("quota exceeded"));
}

#[tokio::test]
async fn unresolvable_image_lands_in_not_found_names() {
    let contents = "![ghost](ghost.png)";
    let buffer = Arc::new(Mutex::new(MemoryBuffer::new("doc.md", contents)));
    let refs = parse_buffer("doc.md", contents);

    let mut ctx = PipelineContext::new("upload").with_client(Arc::new(StubClient::new()));
    ctx.add_group(buffer.clone(), refs);
    // No resolver run: the file map stays empty.

    let report = run(&mut ctx, &upload_workflow()).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.processed, 0);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.not_found_names, vec!["ghost.png".to_string()]);
    assert_eq!(buffer.lock().unwrap().contents(), contents);
}

#[tokio::test]
async fn cancelled_run_performs_no_write_back() {
    let contents = "![demo](demo.png)";
    let replace_calls = Arc::new(AtomicUsize::new(0));
    let buffer = Arc::new(Mutex::new(CountingBuffer::new(
        contents,
        replace_calls.clone(),
    )));
    let refs = parse_buffer("doc.md", contents);

    let client = Arc::new(StubClient::new());
    let mut ctx = PipelineContext::new("upload").with_client(client.clone());
    ctx.add_group(buffer, refs);
    ctx.cancel.cancel();

    let report = run(&mut ctx, &upload_workflow()).await;

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(replace_calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrap_option_rewrites_into_the_anchor_form() {
    let contents = "![demo](demo.png)";
    let buffer = Arc::new(Mutex::new(MemoryBuffer::new("doc.md", contents)));
    let refs = parse_buffer("doc.md", contents);

    let resolver = MemoryResolver::new();
    resolver.insert("demo.png", vec![1]);

    let mut ctx = PipelineContext::new("upload")
        .with_client(Arc::new(StubClient::new()))
        .with_options(PipelineOptions {
            wrap: MarkWrap::Large,
            ..PipelineOptions::default()
        });
    ctx.add_group(buffer.clone(), refs);
    ctx.resolve_local(&resolver).await;

    run(&mut ctx, &upload_workflow()).await;

    let rewritten = buffer.lock().unwrap().contents().to_string();
    assert!(rewritten.starts_with("<a data-fancybox"));
    assert!(rewritten.ends_with("</a>"));
    // The rewritten line parses back as a large-picture mark.
    let parsed = parse_line("doc.md", &rewritten, 0).unwrap();
    assert_eq!(parsed.kind, MarkKind::LargePicture);
}

#[tokio::test]
async fn migration_tail_rewrites_to_the_project_path() {
    // Download already happened: the bytes sit in the file map, so the
    // persist/relabel/write-back tail of the migration workflow runs alone.
    let contents = "![n](https://x.com/n.png)";
    let buffer = Arc::new(Mutex::new(MemoryBuffer::new("doc.md", contents)));
    let refs = parse_buffer("doc.md", contents);
    assert_eq!(refs[0].location, ImageLocation::Network);

    let store = Arc::new(MemoryStore::new("assets"));
    let mut ctx = PipelineContext::new("migrate").with_store(store.clone());
    ctx.add_group(buffer.clone(), refs);
    ctx.add_file("n.png", ImageBytes::new("n.png", vec![7, 7]));

    let handlers = migrate_workflow();
    let report = run(&mut ctx, &handlers[1..]).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.processed, 1);
    assert_eq!(buffer.lock().unwrap().contents(), "![n](assets/n.png)");
    assert_eq!(store.saved_names(), vec!["n.png".to_string()]);
}

#[tokio::test]
async fn migration_without_a_store_aborts_untouched() {
    let contents = "![n](https://x.com/n.png)";
    let replace_calls = Arc::new(AtomicUsize::new(0));
    let buffer = Arc::new(Mutex::new(CountingBuffer::new(
        contents,
        replace_calls.clone(),
    )));
    let refs = parse_buffer("doc.md", contents);

    let mut ctx = PipelineContext::new("migrate");
    ctx.add_group(buffer, refs);
    ctx.add_file("n.png", ImageBytes::new("n.png", vec![7]));

    let handlers = migrate_workflow();
    let report = run(&mut ctx, &handlers[1..]).await;

    assert!(matches!(report.outcome, RunOutcome::Aborted(_)));
    assert_eq!(replace_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn runner_drives_a_full_run_in_the_background() {
    struct CollectSink(Mutex<Vec<RunReport>>);

    impl ResultSink for CollectSink {
        fn on_complete(&self, report: &RunReport) {
            if let Ok(mut reports) = self.0.lock() {
                reports.push(report.clone());
            }
        }
    }

    let contents = "![demo](demo.png)";
    let buffer = Arc::new(Mutex::new(MemoryBuffer::new("doc.md", contents)));
    let refs = parse_buffer("doc.md", contents);

    let resolver = MemoryResolver::new();
    resolver.insert("demo.png", vec![1]);

    let runner = TaskRunner::new();
    let mut ctx = runner
        .context("upload")
        .with_client(Arc::new(StubClient::new()));
    ctx.add_group(buffer.clone(), refs);
    ctx.resolve_local(&resolver).await;

    let sink = Arc::new(CollectSink(Mutex::new(Vec::new())));
    let handle = runner.spawn(ctx, upload_workflow(), sink.clone());
    let report = handle.wait().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(sink.0.lock().unwrap().as_slice(), &[report]);
    assert_eq!(
        buffer.lock().unwrap().contents(),
        "![demo](https://cdn.example/demo.png)"
    );
}
