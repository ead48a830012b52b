//! Tests for terrawalk-core: addresses, diagnostics, plan and state records

use serde_json::json;
use terrawalk_core::*;

fn web() -> ResourceInstanceAddress {
    ResourceInstanceAddress::root(Resource::managed("aws_instance", "web"))
}

// ===========================================================================
// Addresses
// ===========================================================================

#[test]
fn address_display_matches_parse() {
    let module = ModuleInstance::root().child("net", InstanceKey::Str("east".into()));
    let addr = ResourceInstanceAddress::new(
        module,
        Resource::managed("aws_subnet", "private"),
        InstanceKey::Int(0),
    );
    let text = addr.to_string();
    assert_eq!(text, r#"module.net["east"].aws_subnet.private[0]"#);
    assert_eq!(text.parse::<ResourceInstanceAddress>().unwrap(), addr);
}

#[test]
fn address_parse_error_names_input() {
    let err = "module.".parse::<ResourceInstanceAddress>().unwrap_err();
    assert!(matches!(err, Error::InvalidAddress { ref input, .. } if input == "module."));
}

#[test]
fn address_modes() {
    assert_eq!(web().mode(), ResourceMode::Managed);
    let ami: ResourceInstanceAddress = "data.aws_ami.ubuntu".parse().unwrap();
    assert_eq!(ami.mode(), ResourceMode::Data);
}

#[test]
fn addresses_serialize_as_strings() {
    let value = serde_json::to_value(web()).unwrap();
    assert_eq!(value, json!("aws_instance.web"));

    let provider = AbsProviderConfig::new("aws");
    let value = serde_json::to_value(&provider).unwrap();
    assert_eq!(value, json!(r#"provider["registry.terraform.io/hashicorp/aws"]"#));
    let back: AbsProviderConfig = serde_json::from_value(value).unwrap();
    assert_eq!(back, provider);
}

#[test]
fn provider_source_normalization() {
    assert_eq!(
        normalize_provider_source("aws"),
        "registry.terraform.io/hashicorp/aws"
    );
    assert_eq!(
        normalize_provider_source("acme/widgets"),
        "registry.terraform.io/acme/widgets"
    );
    assert_eq!(
        normalize_provider_source("example.com/acme/widgets"),
        "example.com/acme/widgets"
    );
}

// ===========================================================================
// Diagnostics
// ===========================================================================

#[test]
fn diagnostics_errors_stick_once_appended() {
    let mut diags = Diagnostics::new();
    assert!(!diags.has_errors());
    assert!(diags.err().is_none());

    diags.append(Diagnostic::warning("deprecated attribute"));
    assert!(!diags.has_errors());

    diags.append(Error::state_read(web(), "corrupt"));
    assert!(diags.has_errors());

    diags.append(Diagnostics::new());
    diags.append(Diagnostic::warning("another warning"));
    assert!(diags.has_errors());
    assert_eq!(diags.len(), 3);
    assert_eq!(diags.warnings().count(), 2);
}

#[test]
fn diagnostics_keep_order() {
    let diags = Diagnostics::new()
        .with(Diagnostic::error("first"))
        .with(Diagnostic::warning("second"))
        .with(Diagnostic::error("third"));
    let summaries: Vec<&str> = diags.iter().map(|d| d.summary.as_str()).collect();
    assert_eq!(summaries, vec!["first", "second", "third"]);
    assert_eq!(diags.err().unwrap(), "first; third");
}

#[test]
fn error_converts_to_addressed_diagnostic() {
    let diag: Diagnostic = Error::state_write(web(), "disk full").into();
    assert!(diag.is_error());
    assert_eq!(diag.address.as_deref(), Some("aws_instance.web"));
    assert!(diag.summary.contains("disk full"));

    let diag: Diagnostic = Error::HookHalted.into();
    assert!(diag.address.is_none());
}

#[test]
fn diagnostics_from_results() {
    let ok: Result<()> = Ok(());
    assert!(Diagnostics::from(ok).is_empty());

    let failed: Result<()> = Err(Error::Hook("boom".into()));
    let diags = Diagnostics::from(failed);
    assert_eq!(diags.len(), 1);
    assert!(diags.has_errors());
}

#[test]
fn diagnostic_display_includes_address_and_detail() {
    let diag = Diagnostic::error("apply failed")
        .with_address(web())
        .with_detail("provider returned 500");
    assert_eq!(
        diag.to_string(),
        "error: apply failed (aws_instance.web)\n  provider returned 500"
    );
}

// ===========================================================================
// Plans, states, walk operations
// ===========================================================================

#[test]
fn forget_change_has_no_after_value() {
    let change = ResourceInstanceChange::forget(web(), json!({"id": "i-1"}));
    assert_eq!(change.action, Action::Forget);
    assert_eq!(change.before, json!({"id": "i-1"}));
    assert!(change.after.is_null());
    assert!(change.action.is_removal());
    assert!(!Action::Update.is_removal());
}

#[test]
fn change_json_shape() {
    let change = ResourceInstanceChange::new(web(), Action::DeleteThenCreate)
        .with_provider(AbsProviderConfig::new("hashicorp/aws"));
    let value = serde_json::to_value(&change).unwrap();
    assert_eq!(value["action"], json!("delete-then-create"));
    assert_eq!(value["addr"], json!("aws_instance.web"));
    let back: ResourceInstanceChange = serde_json::from_value(value).unwrap();
    assert_eq!(back, change);
}

#[test]
fn null_object_is_null() {
    assert!(ResourceInstanceObject::ready(serde_json::Value::Null).is_null());
    let obj = ResourceInstanceObject::ready(json!({})).with_status(ObjectStatus::Tainted);
    assert!(!obj.is_null());
    assert_eq!(obj.status, ObjectStatus::Tainted);
}

#[test]
fn walk_operation_names() {
    let op: WalkOperation = serde_json::from_value(json!("plan-destroy")).unwrap();
    assert_eq!(op, WalkOperation::PlanDestroy);
    assert_eq!(WalkOperation::Forget.to_string(), "forget");
    assert_eq!(StateScope::default(), StateScope::Working);
}
