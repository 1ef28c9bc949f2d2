use std::io::Write;
use std::path::Path;

use provar_config::load_scenario;
use provar_domain::{ProviderTarget, ResourceName};

#[test]
fn load_valid_fixture() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/scenario.yml");
    let scenario = load_scenario(&path).expect("should load without error");

    assert_eq!(scenario.resource_group.as_str(), "provar-ci");
    assert_eq!(scenario.provider, ProviderTarget::Memory);
    assert_eq!(scenario.seed, Some(423));

    let db = scenario.database_server_spec().expect("db spec");
    assert_eq!(db.sku.tier, "GeneralPurpose");
    assert_eq!(db.location, "eastus2");
    assert_eq!(db.tags.get("env").map(String::as_str), Some("ci"));

    let lb = scenario
        .load_balancer_spec(&ResourceName::new("pipabc1"))
        .expect("lb spec");
    assert_eq!(lb.frontend_public_address.as_str(), "pipabc1");
    assert_eq!(lb.frontend_port, 80);
}

#[test]
fn missing_file_returns_error() {
    let path = Path::new("/nonexistent/path/scenario.yml");
    assert!(load_scenario(path).is_err());
}

fn write_scenario(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write");
    file
}

#[test]
fn unknown_provider_rejected() {
    let file = write_scenario(
        "resource_group: g\nlocation: eastus2\nprovider: gcp\ndatabase_server:\n  sku: {name: B_Gen5_1, tier: Basic}\n  version: \"5.7\"\n  admin_username: a\n  admin_password: b\n",
    );
    let err = load_scenario(file.path()).unwrap_err();
    assert!(err.to_string().contains("unknown provider"), "got: {}", err);
}

#[test]
fn arm_provider_requires_arm_section() {
    let file = write_scenario(
        "resource_group: g\nlocation: eastus2\nprovider: arm\ndatabase_server:\n  sku: {name: B_Gen5_1, tier: Basic}\n  version: \"5.7\"\n  admin_username: a\n  admin_password: b\n",
    );
    let err = load_scenario(file.path()).unwrap_err();
    assert!(err.to_string().contains("arm"), "got: {}", err);
}

#[test]
fn scenario_without_resources_rejected() {
    let file = write_scenario("resource_group: g\nlocation: eastus2\n");
    assert!(load_scenario(file.path()).is_err());
}

#[test]
fn empty_sku_rejected() {
    let file = write_scenario(
        "resource_group: g\nlocation: eastus2\ndatabase_server:\n  sku: {name: \"\", tier: \"\"}\n  version: \"5.7\"\n  admin_username: a\n  admin_password: b\n",
    );
    let err = load_scenario(file.path()).unwrap_err();
    assert!(err.to_string().contains("sku"), "got: {}", err);
}
