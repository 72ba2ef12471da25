// tests/template_expand.rs

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use sciflow::template::{expand_command, placeholders, PortType};
use sciflow::{FileTarget, SciflowError, ShellTask, Task};
use sciflow_test_utils::recording_shell::RecordingShellBackend;
use sciflow_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn discovers_placeholders_in_first_occurrence_order() {
    let found = placeholders("echo {p:x} {i:a} > {o:b}; cat {i:a}");
    let pairs: Vec<(PortType, &str)> = found.iter().map(|p| (p.ty, p.name.as_str())).collect();
    assert_eq!(
        pairs,
        vec![
            (PortType::Param, "x"),
            (PortType::Input, "a"),
            (PortType::Output, "b"),
        ]
    );
}

#[test]
fn ports_are_created_from_the_template() {
    let task = ShellTask::new("echo {i:in1} {p:x} > {o:out1}");
    assert_eq!(task.in_port_names(), vec!["in1"]);
    assert_eq!(task.out_port_names(), vec!["out1"]);
    assert_eq!(task.param_port_names(), vec!["x"]);
}

#[test]
fn expand_command_substitutes_from_all_maps() {
    let cmd = "echo {p:txt} > {i:in}; cat {i:in} > {o:out}";
    let params = BTreeMap::from([("txt".to_string(), "hej".to_string())]);
    let in_paths = BTreeMap::from([("in".to_string(), "in.txt".to_string())]);
    let out_paths = BTreeMap::from([("out".to_string(), "out.txt".to_string())]);

    let expanded = expand_command(cmd, &in_paths, &out_paths, &params).unwrap();
    assert_eq!(expanded, "echo hej > in.txt; cat in.txt > out.txt");
}

#[test]
fn expand_command_fails_on_missing_value() {
    let empty = BTreeMap::new();
    let err = expand_command("cat {i:in}", &empty, &empty, &empty).unwrap_err();
    assert!(matches!(err, SciflowError::Template(_)));
    assert!(err.to_string().contains("{i:in}"));
}

#[tokio::test]
async fn formatted_command_substitutes_the_temp_path() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let foo = dir.path().join("foo.txt").to_string_lossy().into_owned();
        let executed = Arc::new(Mutex::new(Vec::new()));

        let mut task = ShellTask::new("echo {i:in1} > {o:out1}")
            .out_path("out1", |s| format!("{}.bar", s.in_path("in1")))
            .backend(Arc::new(RecordingShellBackend::real(Arc::clone(&executed))));
        let tx = task.in_sender("in1")?;
        let mut out = task.out_receiver("out1")?;

        tokio::spawn(Box::new(task).run());
        tx.send(FileTarget::new(&foo)).await?;
        drop(tx);

        out.recv().await.expect("one file target expected");
        assert!(out.recv().await.is_none());

        let recorded = executed.lock().unwrap().clone();
        assert_eq!(recorded, vec![format!("echo {foo} > {foo}.bar.tmp")]);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn prepend_prefixes_the_expanded_command() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let foo = dir.path().join("foo.txt").to_string_lossy().into_owned();
        let executed = Arc::new(Mutex::new(Vec::new()));

        let mut task = ShellTask::new("echo {i:in1} > {o:out1}")
            .out_path("out1", |s| format!("{}.bar", s.in_path("in1")))
            .prepend("env")
            .backend(Arc::new(RecordingShellBackend::real(Arc::clone(&executed))));
        let tx = task.in_sender("in1")?;
        let mut out = task.out_receiver("out1")?;

        tokio::spawn(Box::new(task).run());
        tx.send(FileTarget::new(&foo)).await?;
        drop(tx);

        out.recv().await.expect("one file target expected");
        assert!(out.recv().await.is_none());

        let recorded = executed.lock().unwrap().clone();
        assert_eq!(recorded, vec![format!("env echo {foo} > {foo}.bar.tmp")]);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn shell_writes_to_temp_path_before_atomize() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let res = dir.path().join("res.txt").to_string_lossy().into_owned();

        // The command echoes its own output placeholder, so the final file
        // records the exact path the shell was handed.
        let produced = res.clone();
        let task =
            ShellTask::new("echo {o:out} > {o:out}").out_path("out", move |_| produced.clone());
        Box::new(task).run().await?;

        assert_eq!(fs::read_to_string(&res)?, format!("{res}.tmp\n"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn expansion_shortcut_creates_no_ports() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let in_file = dir.path().join("in.txt").to_string_lossy().into_owned();
        let out_file = dir.path().join("out.txt").to_string_lossy().into_owned();

        let cmd = "echo {p:txt} > {i:in}; cat {i:in} > {o:out}";
        let params = BTreeMap::from([("txt".to_string(), "hej".to_string())]);
        let in_paths = BTreeMap::from([("in".to_string(), in_file.clone())]);
        let out_paths = BTreeMap::from([("out".to_string(), out_file.clone())]);

        let task = ShellTask::expanded(cmd, &in_paths, &out_paths, &params)?;
        assert_eq!(
            task.command(),
            format!("echo hej > {in_file}; cat {in_file} > {out_file}")
        );
        assert!(task.in_port_names().is_empty());
        assert!(task.out_port_names().is_empty());
        assert!(task.param_port_names().is_empty());

        Box::new(task).run().await?;

        assert!(FileTarget::new(&out_file).exists());
        assert_eq!(fs::read_to_string(&out_file)?, "hej\n");

        Ok(())
    })
    .await
}

proptest! {
    /// After expansion with fully-populated maps, the command contains the
    /// substituted values and no token of the `{TYPE:NAME}` shape remains.
    #[test]
    fn expansion_removes_every_token(
        in_name in "[a-z][a-z0-9]{0,8}",
        out_name in "[a-z][a-z0-9]{0,8}",
        param_name in "[a-z][a-z0-9]{0,8}",
        in_value in "[a-z0-9/._-]{1,20}",
        out_value in "[a-z0-9/._-]{1,20}",
        param_value in "[a-zA-Z0-9 ]{1,20}",
    ) {
        let cmd = format!(
            "run {{i:{in_name}}} --par '{{p:{param_name}}}' > {{o:{out_name}}}"
        );
        let in_paths = BTreeMap::from([(in_name, in_value.clone())]);
        let out_paths = BTreeMap::from([(out_name, out_value.clone())]);
        let params = BTreeMap::from([(param_name, param_value.clone())]);

        let expanded = expand_command(&cmd, &in_paths, &out_paths, &params).unwrap();

        prop_assert!(placeholders(&expanded).is_empty());
        prop_assert!(expanded.contains(&in_value));
        prop_assert!(expanded.contains(&out_value));
        prop_assert!(expanded.contains(&param_value));
    }
}
