#![cfg(all(unix, feature = "fake"))]

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{ensure, Context as _, Result};

use terratest_test_util::terraform::Options;
use terratest_test_util::{assert_output_count, FakeTerraform, ProvisionTestRunner, RunError};

mod common;

fn gce_options(fake: &FakeTerraform) -> Options {
    fake.options()
        .var("name", "server")
        .var("machine_type", "f1-micro")
        .var("zone", "us-central1-a")
}

fn with_outputs(count: usize) -> Result<FakeTerraform> {
    let mut builder = FakeTerraform::builder();
    for i in 0..count {
        builder = builder.output(format!("output_{i}"), format!("value-{i}"));
    }
    builder.build()
}

#[tokio::test]
async fn two_outputs_pass_and_destroy_once() -> Result<()> {
    common::init();
    let fake = FakeTerraform::builder()
        .output("instance_id", "1234567890")
        .output("public_ip", "34.68.1.2")
        .build()?;

    ProvisionTestRunner::new(gce_options(&fake))
        .run(|outputs| async move {
            assert_output_count(&outputs, 2)?;
            ensure!(outputs["public_ip"] == "34.68.1.2");
            Ok(())
        })
        .await
        .context("lifecycle should pass")?;

    assert_eq!(fake.subcommands()?, ["init", "apply", "output", "destroy"]);
    let invocations = fake.invocations()?;
    for line in [&invocations[1], &invocations[3]] {
        assert!(
            line.ends_with("-var machine_type=f1-micro -var name=server -var zone=us-central1-a"),
            "unexpected invocation: {line}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn wrong_output_count_fails_and_still_destroys() -> Result<()> {
    common::init();
    for count in [0, 1, 3] {
        let fake = with_outputs(count)?;
        let err = ProvisionTestRunner::new(gce_options(&fake))
            .run(|outputs| async move {
                assert_output_count(&outputs, 2)?;
                Ok(())
            })
            .await
            .expect_err("wrong output count should fail");

        match &err {
            RunError::Verify { source, cleanup } => {
                assert!(cleanup.is_none());
                assert!(source
                    .to_string()
                    .starts_with(&format!("expected 2 outputs, found {count}")));
            }
            other => panic!("expected verification failure, got {other:?}"),
        }
        assert_eq!(fake.count("destroy")?, 1);
    }
    Ok(())
}

#[tokio::test]
async fn apply_failure_skips_verify_and_destroys() -> Result<()> {
    common::init();
    let fake = FakeTerraform::builder()
        .output("instance_id", "1234567890")
        .apply_exit_code(1)
        .build()?;
    let verified = AtomicBool::new(false);

    let err = ProvisionTestRunner::new(gce_options(&fake))
        .run(|_| async {
            verified.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .expect_err("apply failure should fail the run");

    assert!(matches!(err, RunError::Provision { cleanup: None, .. }));
    assert!(format!("{:#}", anyhow::Error::from(err)).contains("Error: fake apply failure"));
    assert!(!verified.load(Ordering::SeqCst));
    assert_eq!(fake.subcommands()?, ["init", "apply", "destroy"]);
    Ok(())
}

#[tokio::test]
async fn init_failure_skips_apply_and_destroys() -> Result<()> {
    common::init();
    let fake = FakeTerraform::builder()
        .output("instance_id", "1234567890")
        .init_exit_code(1)
        .build()?;
    let verified = AtomicBool::new(false);

    let err = ProvisionTestRunner::new(gce_options(&fake))
        .run(|_| async {
            verified.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .expect_err("init failure should fail the run");

    assert!(matches!(err, RunError::Provision { cleanup: None, .. }));
    assert!(!verified.load(Ordering::SeqCst));
    assert_eq!(fake.subcommands()?, ["init", "destroy"]);
    Ok(())
}

#[tokio::test]
async fn undecodable_outputs_fail_provisioning_and_destroy() -> Result<()> {
    common::init();
    let fake = FakeTerraform::builder().raw_outputs("not json").build()?;
    let verified = AtomicBool::new(false);

    let err = ProvisionTestRunner::new(gce_options(&fake))
        .run(|_| async {
            verified.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .expect_err("undecodable outputs should fail the run");

    assert!(matches!(err, RunError::Provision { cleanup: None, .. }));
    let message = format!("{:#}", anyhow::Error::from(err));
    assert!(
        message.contains("failed to decode `terraform output -json`"),
        "{message}"
    );
    assert!(!verified.load(Ordering::SeqCst));
    assert_eq!(fake.subcommands()?, ["init", "apply", "output", "destroy"]);
    assert_eq!(fake.count("destroy")?, 1);
    Ok(())
}

#[tokio::test]
async fn env_vars_reach_terraform() -> Result<()> {
    common::init();
    let fake = with_outputs(2)?;
    let options = gce_options(&fake)
        .env_var("GOOGLE_PROJECT", "terratest-ci")
        .env_var("TF_LOG", "WARN");

    let runner = ProvisionTestRunner::new(options);
    let provisioned = runner.apply().await?;
    let env = fake.environment()?;
    assert_eq!(env.get("GOOGLE_PROJECT").map(String::as_str), Some("terratest-ci"));
    assert_eq!(env.get("TF_LOG").map(String::as_str), Some("WARN"));
    assert_eq!(env.get("TF_IN_AUTOMATION").map(String::as_str), Some("1"));

    // the blocking destroy from `Drop` gets the same environment
    drop(provisioned);
    assert_eq!(fake.subcommands()?, ["init", "apply", "destroy"]);
    assert_eq!(
        fake.environment()?.get("GOOGLE_PROJECT").map(String::as_str),
        Some("terratest-ci")
    );
    Ok(())
}

#[tokio::test]
async fn destroy_failure_is_reported_with_assertion_failure() -> Result<()> {
    common::init();
    let fake = FakeTerraform::builder()
        .output("instance_id", "1234567890")
        .destroy_exit_code(1)
        .build()?;

    let err = ProvisionTestRunner::new(gce_options(&fake))
        .run(|outputs| async move {
            assert_output_count(&outputs, 2)?;
            Ok(())
        })
        .await
        .expect_err("run should fail");

    assert!(err.destroy_error().is_some());
    let message = format!("{:#}", anyhow::Error::from(err));
    assert!(message.contains("destroy also failed"), "{message}");
    assert!(message.contains("Error: fake destroy failure"), "{message}");
    assert!(message.contains("expected 2 outputs, found 1"), "{message}");
    assert_eq!(fake.count("destroy")?, 1);
    Ok(())
}

#[tokio::test]
async fn destroy_failure_alone_fails_the_run() -> Result<()> {
    common::init();
    let fake = FakeTerraform::builder()
        .output("instance_id", "1234567890")
        .output("public_ip", "34.68.1.2")
        .destroy_exit_code(3)
        .build()?;

    let err = ProvisionTestRunner::new(fake.options())
        .run(|outputs| async move {
            assert_output_count(&outputs, 2)?;
            Ok(())
        })
        .await
        .expect_err("destroy failure should fail the run");
    assert!(matches!(err, RunError::Destroy(_)));
    assert_eq!(fake.count("destroy")?, 1);
    Ok(())
}

#[tokio::test]
async fn panic_in_verify_still_destroys() -> Result<()> {
    common::init();
    let fake = with_outputs(2)?;

    let err = ProvisionTestRunner::new(fake.options())
        .run(|_| async { panic!("instance never became reachable") })
        .await
        .expect_err("panic should fail the run");

    match err {
        RunError::Verify { source, cleanup } => {
            assert!(cleanup.is_none());
            assert_eq!(
                source.to_string(),
                "verification panicked: instance never became reachable"
            );
        }
        other => panic!("expected verification failure, got {other:?}"),
    }
    assert_eq!(fake.count("destroy")?, 1);
    Ok(())
}

#[tokio::test]
async fn dropped_guard_destroys() -> Result<()> {
    common::init();
    let fake = with_outputs(2)?;
    let runner = ProvisionTestRunner::new(fake.options());

    async fn early_return(runner: &ProvisionTestRunner) -> Result<()> {
        let provisioned = runner.apply().await?;
        let outputs = provisioned.output_all().await?;
        assert_output_count(&outputs, 3)?;
        provisioned.destroy().await?;
        Ok(())
    }

    early_return(&runner)
        .await
        .expect_err("assertion should return early");
    assert_eq!(fake.subcommands()?, ["init", "apply", "output", "destroy"]);
    Ok(())
}

#[tokio::test]
async fn explicit_destroy_runs_once() -> Result<()> {
    common::init();
    let fake = with_outputs(2)?;
    let runner = ProvisionTestRunner::new(fake.options());

    let provisioned = runner.apply().await?;
    assert_eq!(provisioned.output("output_1").await?, "value-1");
    provisioned.destroy().await?;

    assert_eq!(fake.count("destroy")?, 1);
    Ok(())
}

#[tokio::test]
async fn transient_apply_errors_are_retried() -> Result<()> {
    common::init();
    let fake = FakeTerraform::builder()
        .output("instance_id", "1234567890")
        .output("public_ip", "34.68.1.2")
        .transient_apply_failures(2, "Error: Error installing provider \"google\"")
        .build()?;
    let mut options = gce_options(&fake).with_default_retryable_errors();
    options.retry.time_between_retries = Duration::from_millis(10);

    ProvisionTestRunner::new(options)
        .run(|outputs| async move {
            assert_output_count(&outputs, 2)?;
            Ok(())
        })
        .await?;

    assert_eq!(fake.count("apply")?, 3);
    assert_eq!(fake.count("destroy")?, 1);
    Ok(())
}

#[tokio::test]
async fn unknown_errors_are_not_retried() -> Result<()> {
    common::init();
    let fake = FakeTerraform::builder()
        .transient_apply_failures(1, "Error: googleapi: Error 403: Permission denied")
        .build()?;
    let mut options = fake.options().with_default_retryable_errors();
    options.retry.time_between_retries = Duration::from_millis(10);

    let err = ProvisionTestRunner::new(options)
        .run(|_| async { Ok(()) })
        .await
        .expect_err("non-retryable failure should fail the run");

    assert!(matches!(err, RunError::Provision { .. }));
    assert_eq!(fake.count("apply")?, 1);
    Ok(())
}
