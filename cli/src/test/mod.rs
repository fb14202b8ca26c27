#![allow(clippy::unwrap_used)]

use predicates::prelude::{
    predicate::str::{contains, is_empty},
    PredicateBooleanExt,
};

use crate::profile::Profile;
use test_context::TestContext;


#[test]
fn test_profile_arg() {
    // --profile-path wins over CARAVAN_PROFILE
    let context = TestContext::new();
    let other = context.temp_dir.path().join("other.toml");

    let assert = context
        .command()
        .args(["--profile-path", other.to_str().unwrap()])
        .arg("config")
        .assert();

    assert
        .success()
        .stdout(
            contains("other.toml")
                .and(contains(r#""profile_exists": false"#))
                .and(contains(r#""base_url": "http://localhost:3000/api""#)),
        )
        .stderr(is_empty());
}

#[test]
fn test_env_overrides_profile() {
    let context = TestContext::with_profile(&Profile {
        base_url: Some("https://profile.example.com/api".to_string()),
        locale: Some("cs".to_string()),
        page_size: Some(50),
        ..Profile::default()
    });

    context
        .command()
        .env("CARAVAN_BASE_URL", "https://env.example.com/api")
        .arg("config")
        .assert()
        .success()
        .stdout(
            contains(r#""base_url": "https://env.example.com/api""#)
                .and(contains(r#""locale": "cs""#))
                .and(contains(r#""page_size": 50"#))
                .and(contains(r#""profile_exists": true"#)),
        );
}

#[test]
fn test_config_never_prints_token() {
    let context = TestContext::new();

    context
        .command()
        .env("CARAVAN_TOKEN", "supersecret")
        .arg("config")
        .assert()
        .success()
        .stdout(contains(r#""has_token": true"#).and(contains("supersecret").not()));
}

#[test]
fn test_init_writes_profile_once() {
    let context = TestContext::new();

    context
        .command()
        .env("CARAVAN_BASE_URL", "https://fleet.example.com/api")
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Profile written to"));

    let profile = Profile::from_path(&context.profile_path).unwrap().unwrap();
    assert_eq!(
        profile.base_url.as_deref(),
        Some("https://fleet.example.com/api")
    );

    context
        .command()
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("Profile already exists"));

    context.command().args(["init", "--force"]).assert().success();
}

#[test]
fn test_completions() {
    TestContext::new()
        .command()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(contains("caravan"));
}
