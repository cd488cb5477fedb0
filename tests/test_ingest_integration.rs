//! Integration tests for the full ingest → store → model lifecycle.
//!
//! Key integration points tested:
//! - Worker-thread run over mixed key-value logs (values, zones, tags)
//! - finish_if_required() rebuilding the model on the caller thread
//! - Hover and diff queries against the reconstructed series
//! - Display settings persisted into the project and replayed on reload
//! - Per-file rollback leaving the project consistent across reopens

#[cfg(test)]
mod ingest_integration_tests {
    use siglog::{
        EngineConfig, IngestJob, IngestPipeline, ParserKind, SeriesModel, SignalStore, ValueRange,
    };
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn test_model() -> SeriesModel {
        SeriesModel::new(EngineConfig {
            auto_color: false,
            ..EngineConfig::default()
        })
    }

    fn run_to_completion(pipeline: &mut IngestPipeline, model: &mut SeriesModel) {
        for _ in 0..500 {
            if pipeline.finish_if_required(model) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("ingest did not finish in time");
    }

    #[test]
    fn test_full_project_lifecycle() {
        init_logs();
        let dir = tempdir().unwrap();
        let project = dir.path().join("session.db");

        // 1. Two source files: host metrics and job zones/tags.
        let host_log = write_file(
            &dir,
            "host.log",
            concat!(
                "pid 4242 starting metrics daemon\n",
                "100.0 cpu/usage=42.0 sampled\n",
                "100.0 mem/free=512.0\n",
                "200.0 cpu/usage=84.0\n",
                "200.0 mem/free=512.0\n",
                "300.0 cpu/usage=84.0\n",
                "300.0 mem/free=512.0\n",
            ),
        );
        let jobs_log = write_file(
            &dir,
            "jobs.log",
            concat!(
                "150.0 >job/build compile started\n",
                "150.0 #deploy v2 rollout\n",
                "250.0 <job/build all green\n",
            ),
        );

        // 2. Run the worker and rebuild the model.
        let mut model = test_model();
        let mut pipeline = IngestPipeline::new();
        assert!(pipeline.start(
            &mut model,
            IngestJob {
                project_file: project.clone(),
                source_files: vec![host_log, jobs_log],
                parser: ParserKind::KeyValue,
            }
        ));
        run_to_completion(&mut pipeline, &mut model);
        assert!(!pipeline.is_working());

        // 3. Reconstruction: three series, shared extent, padded zones.
        assert_eq!(model.sources().len(), 2);
        assert_eq!(
            model.time_range(),
            Some(ValueRange {
                min: 100.0,
                max: 300.0
            })
        );
        let build = model.serie_by_name("job", "build").unwrap();
        assert!(build.has_zones());
        // 2 real zone ticks + virtual padding at 100.0 and 300.0.
        assert_eq!(build.len(), 4);
        assert!(model.serie_by_name("mem", "free").unwrap().is_constant());
        assert!(!model.serie_by_name("cpu", "usage").unwrap().is_constant());
        assert_eq!(model.tags().len(), 1);
        assert_eq!(model.tags()[0].name, "deploy");

        // 4. Temporal queries on the visible set.
        model.show_hide_signal("cpu", "usage", true);
        model.show_hide_signal("mem", "free", true);

        model.set_hovered_time(150.0);
        let usage = model.serie_by_name("cpu", "usage").unwrap();
        let preview = model.tick(usage.preview().unwrap()).unwrap();
        assert_eq!(preview.value.as_f64(), Some(42.0));

        model.set_first_diff_mark(120.0);
        model.set_second_diff_mark(260.0);
        model.compute_diff_result();
        // Only cpu/usage changed between the marks; mem/free is flat.
        assert_eq!(model.diff_result().len(), 1);
        assert_eq!(
            model.diff_result()[0].serie,
            model.serie_id("cpu", "usage").unwrap()
        );

        // 5. Group mem/free into its own bucket and persist the layout.
        model.move_signal_to_group("mem", "free", 1);
        let store = SignalStore::open(&project).unwrap();
        assert!(store.save_settings(&model.prepare_for_save()));
        drop(store);

        // 6. Fresh session over the same project file: reload + replay.
        let store = SignalStore::open(&project).unwrap();
        let mut reloaded = test_model();
        assert!(reloaded.finalize(&store));
        assert_eq!(reloaded.visible_count(), 0);

        let saved = store.load_settings().unwrap();
        reloaded.apply_saved_settings(&saved);

        assert_eq!(reloaded.visible_count(), 2);
        let cpu = reloaded.serie_id("cpu", "usage").unwrap();
        let mem = reloaded.serie_id("mem", "free").unwrap();
        assert_eq!(reloaded.groups().group_id_of(cpu), 0);
        assert_eq!(reloaded.groups().group_id_of(mem), 1);
        assert!(!reloaded.serie_by_name("job", "build").unwrap().visible());

        // The reloaded model answers the same hover query.
        reloaded.set_hovered_time(150.0);
        let usage = reloaded.serie_by_name("cpu", "usage").unwrap();
        let preview = reloaded.tick(usage.preview().unwrap()).unwrap();
        assert_eq!(preview.value.as_f64(), Some(42.0));
    }

    #[test]
    fn test_partial_failure_is_isolated_per_file() {
        init_logs();
        let dir = tempdir().unwrap();
        let project = dir.path().join("session.db");

        // 1. File A parses cleanly, file B breaks on its third line.
        let clean = write_file(
            &dir,
            "clean.jsonl",
            concat!(
                "{\"time\":100.0,\"category\":\"cpu\",\"name\":\"usage\",\"value\":42.0}\n",
                "{\"time\":200.0,\"category\":\"cpu\",\"name\":\"usage\",\"value\":84.0}\n",
            ),
        );
        let broken = write_file(
            &dir,
            "broken.jsonl",
            concat!(
                "{\"time\":110.0,\"category\":\"mem\",\"name\":\"free\",\"value\":1.0}\n",
                "{\"time\":120.0,\"category\":\"mem\",\"name\":\"free\",\"value\":2.0}\n",
                "this is not json\n",
                "{\"time\":130.0,\"category\":\"mem\",\"name\":\"free\",\"value\":3.0}\n",
            ),
        );

        let mut model = test_model();
        let mut pipeline = IngestPipeline::new();
        assert!(pipeline.start(
            &mut model,
            IngestJob {
                project_file: project.clone(),
                source_files: vec![clean, broken],
                parser: ParserKind::JsonLines,
            }
        ));
        run_to_completion(&mut pipeline, &mut model);

        // 2. The run completed; A's ticks all present, B rolled back fully.
        assert!(model.serie_by_name("cpu", "usage").is_some());
        assert!(model.serie_by_name("mem", "free").is_none());
        assert_eq!(model.sources().len(), 1);

        // 3. The durable state agrees after an independent reopen.
        let store = SignalStore::open(&project).unwrap();
        let mut rows = 0;
        assert!(store.for_each_tick(|row| {
            assert_eq!(row.category, "cpu");
            rows += 1;
        }));
        assert_eq!(rows, 2);
    }
}
