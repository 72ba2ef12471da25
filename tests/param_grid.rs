// tests/param_grid.rs

use std::error::Error;
use std::fs;

use sciflow::{CartesianParams, Pipeline, ShellTask, Task};
use sciflow_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn cartesian_product_streams_all_combinations() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let dir_path = dir.path().to_string_lossy().into_owned();
        let log = dir.path().join("log.txt");

        let mut cmb = CartesianParams::new(vec![
            ("a", vec!["a1", "a2", "a3"]),
            ("b", vec!["b1", "b2", "b3"]),
            ("c", vec!["c1", "c2", "c3"]),
        ]);

        let out_dir = dir_path.clone();
        let mut abc = ShellTask::new("echo {p:a} {p:b} {p:c} > {o:out}").out_path(
            "out",
            move |s| {
                format!(
                    "{out_dir}/{}_{}_{}.txt",
                    s.param("a"),
                    s.param("b"),
                    s.param("c")
                )
            },
        );
        abc.connect_param("a", cmb.receiver("a")?);
        abc.connect_param("b", cmb.receiver("b")?);
        abc.connect_param("c", cmb.receiver("c")?);

        let mut sink = ShellTask::new(format!(
            "cat {{i:in}} >> {}; rm {{i:in}}",
            log.display()
        ));
        sink.connect_in("in", abc.out_receiver("out")?);

        let mut pipeline = Pipeline::new();
        pipeline.add_task(cmb);
        pipeline.add_task(abc);
        pipeline.add_task(sink);
        pipeline.run().await?;

        let content = fs::read_to_string(&log)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 27);

        // Row-major order, the last axis varying fastest.
        assert_eq!(lines[0], "a1 b1 c1");
        assert_eq!(lines[1], "a1 b1 c2");
        assert_eq!(lines[3], "a1 b2 c1");
        assert_eq!(lines[26], "a3 b3 c3");

        // Every intermediate file was consumed and removed by the sink.
        for entry in fs::read_dir(dir.path())? {
            assert_eq!(entry?.path(), log);
        }

        Ok(())
    })
    .await
}

#[tokio::test]
async fn manually_fed_parameters_drive_one_iteration_each() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let base = dir.path().to_string_lossy().into_owned();

        let out_dir = base.clone();
        let mut task = ShellTask::new("echo {p:n} > {o:out}")
            .out_path("out", move |s| format!("{out_dir}/{}.txt", s.param("n")));
        let tx = task.param_sender("n")?;
        let mut out = task.out_receiver("out")?;

        tokio::spawn(Box::new(task).run());

        tx.send("one".to_string()).await?;
        tx.send("two".to_string()).await?;
        drop(tx);

        let first = out.recv().await.expect("first file target expected");
        assert_eq!(first.path(), format!("{base}/one.txt"));
        let second = out.recv().await.expect("second file target expected");
        assert_eq!(second.path(), format!("{base}/two.txt"));
        assert!(out.recv().await.is_none());

        Ok(())
    })
    .await
}

#[tokio::test]
async fn with_params_runs_a_single_iteration() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let out_file = dir.path().join("combined.txt").to_string_lossy().into_owned();

        let produced = out_file.clone();
        let mut task =
            ShellTask::with_params("echo {p:a}-{p:b} > {o:out}", [("a", "x"), ("b", "y")])?
                .out_path("out", move |_| produced.clone());
        let mut out = task.out_receiver("out")?;

        tokio::spawn(Box::new(task).run());

        let target = out.recv().await.expect("one file target expected");
        assert_eq!(target.path(), out_file);
        assert_eq!(String::from_utf8(target.read()?)?, "x-y\n");
        assert!(out.recv().await.is_none());

        Ok(())
    })
    .await
}
