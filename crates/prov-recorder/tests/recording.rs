use pretty_assertions::assert_eq;
use prov_model::{CellHandle, CellId};
use prov_recorder::{
    ExecutionRecorder, LifecycleEvent, RecordOutcome, RecorderError, RecorderSettings, ReplyStatus,
};
use prov_test_utils::{memory_store, MemoryNotebook, ScriptedAnalyzer, ScriptedInspector};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn request(msg_id: &str, handle: &str) -> LifecycleEvent {
    LifecycleEvent::ExecuteRequestSent {
        msg_id: msg_id.to_string(),
        handle: CellHandle::new(handle),
    }
}

fn reply(msg_id: &str, execution_count: u32) -> LifecycleEvent {
    LifecycleEvent::ExecuteReplyReceived {
        msg_id: msg_id.to_string(),
        status: ReplyStatus::Ok,
        execution_count,
    }
}

async fn recorder(
    analyzer: ScriptedAnalyzer,
    inspector: ScriptedInspector,
    notebook: Arc<MemoryNotebook>,
) -> Arc<ExecutionRecorder> {
    let settings = RecorderSettings::default().with_analysis_timeout(Duration::from_secs(1));
    Arc::new(
        ExecutionRecorder::new(
            memory_store().await,
            Arc::new(analyzer),
            Arc::new(inspector),
            notebook,
            settings,
        )
        .unwrap(),
    )
}

/// Inspection of cell `i`'s symbol takes `delays[i]` milliseconds
async fn record_with_inspection_delays(delays: Vec<u64>) -> Vec<u32> {
    let notebook = Arc::new(MemoryNotebook::new());
    let mut analyzer = ScriptedAnalyzer::new();
    let mut inspector = ScriptedInspector::new();
    for (index, delay) in delays.iter().enumerate() {
        let symbol = format!("v{index}");
        let source = format!("{symbol} = {index}");
        notebook.add_code(&format!("h{index}"), &source);
        analyzer = analyzer.with(&source, &[symbol.as_str()], &[]);
        inspector = inspector
            .with(&symbol, "int")
            .with_delay(&symbol, Duration::from_millis(*delay));
    }
    let recorder = recorder(analyzer, inspector, notebook).await;

    for index in 0..delays.len() {
        recorder.submit(request(&format!("m{index}"), &format!("h{index}")));
    }
    let replies: Vec<_> = (0..delays.len())
        .map(|index| {
            let count = u32::try_from(index).unwrap() + 1;
            recorder.submit(reply(&format!("m{index}"), count))
        })
        .collect();
    for reply in replies {
        assert!(reply.await.unwrap().receipt().is_some());
    }

    let data = recorder.store().snapshot().await;
    data.epochs[0].data.iter().map(|record| record.execution_count).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_records_follow_send_order(
        delays in Just(vec![0u64, 10, 20, 30, 40]).prop_shuffle()
    ) {
        let order = runtime().block_on(record_with_inspection_delays(delays));
        prop_assert_eq!(order, vec![1, 2, 3, 4, 5]);
    }
}

#[tokio::test]
async fn deleted_cell_is_dropped_and_next_execution_recorded() {
    let notebook = Arc::new(MemoryNotebook::new());
    notebook.add_code("h1", "a = 1");
    notebook.add_code("h2", "b = a");
    let analyzer = ScriptedAnalyzer::new()
        .with("a = 1", &["a"], &[])
        .with("b = a", &["b"], &["a"]);
    let recorder = recorder(analyzer, ScriptedInspector::new(), Arc::clone(&notebook)).await;

    recorder.handle(request("m1", "h1")).await;
    recorder.handle(request("m2", "h2")).await;
    notebook.remove("h1");

    let first = recorder.handle(reply("m1", 1)).await;
    assert!(matches!(first, RecordOutcome::Dropped(RecorderError::CellNotFound(_))));
    let second = recorder.handle(reply("m2", 2)).await;
    assert!(second.receipt().is_some());

    let data = recorder.store().snapshot().await;
    assert_eq!(data.execution_total(), 1);
    assert_eq!(data.epochs[0].data[0].remote, vec!["a".to_string()]);
}

#[tokio::test]
async fn execution_uses_analysis_of_latest_edit() {
    let notebook = Arc::new(MemoryNotebook::new());
    notebook.add_code("h1", "x = 1");
    let analyzer = ScriptedAnalyzer::new()
        .with("x = 1", &["x"], &[])
        .with("y = 2", &["y"], &[])
        .with_delay("y = 2", Duration::from_millis(100));
    let recorder = recorder(analyzer, ScriptedInspector::new(), Arc::clone(&notebook)).await;

    recorder.submit(LifecycleEvent::CellSourceChanged {
        handle: CellHandle::new("h1"),
        source: "x = 1".into(),
    });
    notebook.set_source("h1", "y = 2");
    recorder.submit(LifecycleEvent::CellSourceChanged {
        handle: CellHandle::new("h1"),
        source: "y = 2".into(),
    });
    recorder.submit(request("m1", "h1"));

    assert!(recorder.handle(reply("m1", 1)).await.receipt().is_some());
    let data = recorder.store().snapshot().await;
    let record = &data.epochs[0].data[0];
    assert_eq!(record.cell_source, "y = 2");
    assert_eq!(record.local, vec!["y".to_string()]);
}

#[tokio::test]
async fn inspection_replies_are_cleaned() {
    let notebook = Arc::new(MemoryNotebook::new());
    notebook.add_code("h1", "df = load()");
    let analyzer = ScriptedAnalyzer::new().with("df = load()", &["df"], &[]);
    let reply_text = "\u{1b}[1;31mType:\u{1b}[0m DataFrame\n\u{1b}[1;31mSource:\u{1b}[0m class DataFrame: ...\n";
    let inspector = ScriptedInspector::new().with("df", reply_text);
    let recorder = recorder(analyzer, inspector, Arc::clone(&notebook)).await;

    recorder.handle(request("m1", "h1")).await;
    recorder.handle(reply("m1", 1)).await;

    let data = recorder.store().snapshot().await;
    assert_eq!(data.epochs[0].data[0].local_info["df"], "Type: DataFrame\n");
    assert_eq!(notebook.cell("h1").unwrap().cell_id, Some(CellId::new("h1")));
}

#[tokio::test]
async fn restart_opens_new_epoch() {
    let notebook = Arc::new(MemoryNotebook::new());
    notebook.add_code("h1", "a = 1");
    let analyzer = ScriptedAnalyzer::new().with("a = 1", &["a"], &[]);
    let recorder = recorder(analyzer, ScriptedInspector::new(), notebook).await;

    recorder.handle(request("m1", "h1")).await;
    recorder.handle(reply("m1", 1)).await;
    recorder.handle(LifecycleEvent::KernelRestarted).await;
    recorder.handle(request("m2", "h1")).await;
    let outcome = recorder.handle(reply("m2", 1)).await;

    assert!(outcome.receipt().unwrap().opened_epoch);
    assert_eq!(recorder.store().snapshot().await.epochs.len(), 2);
}
