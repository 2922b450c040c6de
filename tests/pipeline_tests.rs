use anyhow::Result;
use layerbox::domain::{
    BuildRequest, ConfigOverrides, DeleteOutcome, ImageConfig, LayerSet, MutateArg,
};
use layerbox::services::{BuildStage, ImageBuilder};
use layerbox::test_support::MockImageTool;
use std::path::PathBuf;
use std::sync::Arc;

const PORT: u16 = 61978;

fn busybox_request(name: &str, overrides: ConfigOverrides) -> BuildRequest {
    BuildRequest {
        base: PathBuf::from("/images/busybox"),
        layers: LayerSet::default(),
        overrides,
        output: PathBuf::from("/out/layout"),
        name: name.to_string(),
    }
}

fn sh_config() -> ImageConfig {
    ImageConfig {
        cmd: Some(vec!["sh".to_string()]),
        ..Default::default()
    }
}

#[test]
fn test_zero_layer_build_inherits_base_command() -> Result<()> {
    let mock = Arc::new(MockImageTool::new());
    mock.set_base_config(sh_config());
    let builder = ImageBuilder::new(mock.clone(), PORT);

    let report = builder.build(&busybox_request("myimg", ConfigOverrides::default()))?;

    assert_eq!(report.resolved.cmd.as_deref(), Some("sh"));
    assert_eq!(report.mutate_args, vec![MutateArg::Cmd("sh".into())]);
    assert_eq!(report.stage, BuildStage::Done);

    assert_eq!(
        mock.get_commands(),
        vec![
            "push:/images/busybox->localhost:61978/busybox",
            "delete:localhost:61978/myimg",
            "append:localhost:61978/busybox+[]->localhost:61978/myimg",
            "config:localhost:61978/busybox",
            "mutate:localhost:61978/myimg",
            "pull:localhost:61978/myimg->oci:/out/layout",
        ]
    );
    assert_eq!(mock.get_mutations(), vec![vec![MutateArg::Cmd("sh".into())]]);
    Ok(())
}

#[test]
fn test_env_and_user_in_caller_order() -> Result<()> {
    let mock = Arc::new(MockImageTool::new());
    let builder = ImageBuilder::new(mock.clone(), PORT);

    let overrides = ConfigOverrides {
        env: vec!["A=1".into(), "B=2".into()],
        user: Some("1000".into()),
        ..Default::default()
    };
    let report = builder.build(&busybox_request("myimg", overrides))?;

    assert_eq!(
        report.mutate_args,
        vec![
            MutateArg::Env("A=1".into()),
            MutateArg::Env("B=2".into()),
            MutateArg::User("1000".into()),
        ]
    );
    Ok(())
}

#[test]
fn test_entrypoint_only_override_keeps_command() -> Result<()> {
    let mock = Arc::new(MockImageTool::new());
    mock.set_base_config(ImageConfig {
        cmd: Some(vec!["nginx".into(), "-g".into(), "daemon off;".into()]),
        entrypoint: Some(vec!["/docker-entrypoint.sh".into()]),
        ..Default::default()
    });
    let builder = ImageBuilder::new(mock.clone(), PORT);

    let overrides = ConfigOverrides {
        entrypoint: Some("/custom-entry".into()),
        ..Default::default()
    };
    let report = builder.build(&busybox_request("web", overrides))?;

    assert_eq!(
        report.mutate_args,
        vec![
            MutateArg::Entrypoint("/custom-entry".into()),
            MutateArg::Cmd("nginx,-g,daemon off;".into()),
        ]
    );
    Ok(())
}

#[test]
fn test_no_metadata_anywhere_emits_no_cmd_or_entrypoint() -> Result<()> {
    let mock = Arc::new(MockImageTool::new());
    let builder = ImageBuilder::new(mock.clone(), PORT);

    let overrides = ConfigOverrides {
        workdir: Some("/srv".into()),
        ..Default::default()
    };
    let report = builder.build(&busybox_request("bare", overrides))?;

    assert_eq!(report.mutate_args, vec![MutateArg::Workdir("/srv".into())]);
    Ok(())
}

#[test]
fn test_layers_are_appended_in_order() -> Result<()> {
    let mock = Arc::new(MockImageTool::new());
    let builder = ImageBuilder::new(mock.clone(), PORT);

    let mut request = busybox_request("app", ConfigOverrides::default());
    request.layers = LayerSet::new(vec![
        "/layers/03-app.tar".into(),
        "/layers/01-deps.tar".into(),
    ]);
    builder.build(&request)?;

    assert!(mock.get_commands().contains(
        &"append:localhost:61978/busybox+[/layers/03-app.tar,/layers/01-deps.tar]->localhost:61978/app"
            .to_string()
    ));
    Ok(())
}

#[test]
fn test_repeated_builds_delete_stale_target_each_time() -> Result<()> {
    let mock = Arc::new(MockImageTool::new());
    mock.set_base_config(sh_config());
    let builder = ImageBuilder::new(mock.clone(), PORT);
    let request = busybox_request("myimg", ConfigOverrides::default());

    let first = builder.build(&request)?;
    mock.set_delete_outcome(DeleteOutcome::Deleted);
    let second = builder.build(&request)?;

    assert_eq!(first.mutate_args, second.mutate_args);
    assert_eq!(first.target_ref, second.target_ref);
    assert_eq!(first.stale_delete, DeleteOutcome::NotFound);
    assert_eq!(second.stale_delete, DeleteOutcome::Deleted);

    let deletes = mock
        .get_commands()
        .iter()
        .filter(|c| c.starts_with("delete:"))
        .count();
    assert_eq!(deletes, 2);
    Ok(())
}

#[test]
fn test_failure_before_pull_leaves_output_untouched() {
    for failing in ["push", "append", "config", "mutate"] {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("layout");

        let mock = Arc::new(MockImageTool::new());
        mock.write_output_on_pull();
        mock.set_fail_on(failing);
        let builder = ImageBuilder::new(mock.clone(), PORT);

        let mut request = busybox_request("app", ConfigOverrides::default());
        request.output = output.clone();

        assert!(builder.build(&request).is_err(), "{failing} should abort");
        assert!(!output.exists(), "{failing} left output behind");
        assert!(
            !mock.get_commands().iter().any(|c| c.starts_with("pull:")),
            "{failing} still reached pull"
        );
    }
}

#[test]
fn test_successful_build_writes_layout() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("layout");

    let mock = Arc::new(MockImageTool::new());
    mock.write_output_on_pull();
    let builder = ImageBuilder::new(mock.clone(), PORT);

    let mut request = busybox_request("myimg", ConfigOverrides::default());
    request.output = output.clone();
    builder.build(&request)?;

    assert!(output.join("index.json").exists());
    Ok(())
}
