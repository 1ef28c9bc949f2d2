#[cfg(test)]
mod tests {
    use crate::naming::*;
    use crate::types::*;
    use std::collections::HashMap;

    fn group() -> ResourceGroup {
        ResourceGroup::new("provar-ci")
    }

    // ── naming ────────────────────────────────────────────────────────────────

    #[test]
    fn prefix_is_deterministic() {
        assert_eq!(derive_prefix(&group()), derive_prefix(&group()));
    }

    #[test]
    fn prefix_is_seven_hex_chars() {
        let p = derive_prefix(&group());
        assert_eq!(p.len(), 7);
        assert!(p.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn prefix_differs_across_groups() {
        assert_ne!(
            derive_prefix(&ResourceGroup::new("group-a")),
            derive_prefix(&ResourceGroup::new("group-b")),
        );
    }

    #[test]
    fn suffix_stable_for_same_seed() {
        assert_eq!(derive_suffix(&group(), 423), derive_suffix(&group(), 423));
    }

    #[test]
    fn suffix_differs_across_seeds() {
        assert_ne!(derive_suffix(&group(), 1), derive_suffix(&group(), 2));
    }

    #[test]
    fn suffix_random_component_stays_below_1000() {
        let suffix = derive_suffix(&group(), 1_000_423);
        let tail = &suffix[7..];
        assert_eq!(tail, "423");
    }

    #[test]
    fn suffix_shares_group_prefix() {
        let prefix = derive_prefix(&group());
        assert!(derive_suffix(&group(), 7).starts_with(&prefix));
        assert!(derive_suffix(&group(), 991).starts_with(&prefix));
    }

    #[test]
    fn run_context_names_carry_kind_stem_and_suffix() {
        let ctx = RunContext::derive(group(), 42);
        let name = ctx.name_for(ResourceKind::DatabaseServer);
        assert!(name.as_str().starts_with("mysqlsrv"));
        assert!(name.as_str().ends_with(&ctx.suffix));
    }

    // ── spec validation ───────────────────────────────────────────────────────

    fn db_spec() -> DatabaseServerSpec {
        DatabaseServerSpec {
            sku: Sku {
                name: "GP_Gen4_2".into(),
                tier: "GeneralPurpose".into(),
                family: Some("Gen4".into()),
                capacity: Some(2),
            },
            version: "5.7".into(),
            storage_mb: 51200,
            admin_username: "zimxyz".into(),
            admin_password: "Testpasswordxyz12!".into(),
            location: "eastus2".into(),
            tags: HashMap::new(),
        }
    }

    #[test]
    fn valid_database_server_spec_passes() {
        assert!(ResourceSpec::DatabaseServer(db_spec()).validate().is_ok());
    }

    #[test]
    fn empty_admin_username_rejected() {
        let mut spec = db_spec();
        spec.admin_username.clear();
        let err = ResourceSpec::DatabaseServer(spec).validate().unwrap_err();
        assert!(err.to_string().contains("admin_username"), "got: {}", err);
    }

    #[test]
    fn zero_storage_rejected() {
        let mut spec = db_spec();
        spec.storage_mb = 0;
        assert!(ResourceSpec::DatabaseServer(spec).validate().is_err());
    }

    #[test]
    fn zero_port_load_balancer_rejected() {
        let spec = LoadBalancerSpec {
            frontend_public_address: ResourceName::new("pipabc1"),
            sku: "Basic".into(),
            probe_port: 0,
            probe_protocol: ProbeProtocol::Tcp,
            frontend_port: 80,
            backend_port: 8080,
            location: "eastus2".into(),
            tags: HashMap::new(),
        };
        assert!(ResourceSpec::LoadBalancer(spec).validate().is_err());
    }

    // ── observed fields ───────────────────────────────────────────────────────

    fn observed(kind: ResourceKind) -> ObservedResource {
        ObservedResource {
            id: "/subscriptions/s/resourceGroups/g/providers/x/y".into(),
            name: "y".into(),
            kind,
            location: "eastus2".into(),
            provisioning_state: "Succeeded".into(),
            sku: Some(Sku {
                name: "Basic".into(),
                tier: "Basic".into(),
                family: None,
                capacity: None,
            }),
            version: None,
            endpoint: Some("198.51.100.7".into()),
            tags: HashMap::new(),
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn complete_public_address_record_has_no_missing_fields() {
        assert!(observed(ResourceKind::PublicAddress).missing_fields().is_empty());
    }

    #[test]
    fn database_server_requires_version() {
        let missing = observed(ResourceKind::DatabaseServer).missing_fields();
        assert_eq!(missing, vec!["version"]);
    }

    #[test]
    fn missing_endpoint_is_reported() {
        let mut rec = observed(ResourceKind::LoadBalancer);
        rec.endpoint = None;
        assert!(rec.missing_fields().contains(&"endpoint"));
    }

    // ── facts ─────────────────────────────────────────────────────────────────

    #[test]
    fn facts_are_keyed_by_name_and_never_changed() {
        let facts = Facts::single(observed(ResourceKind::PublicAddress));
        assert!(facts.contains(&ResourceName::new("y")));
        assert!(!facts.changed);
    }

    #[test]
    fn empty_facts() {
        let facts = Facts::empty();
        assert!(facts.is_empty());
        assert!(!facts.changed);
    }

    // ── tag filter ────────────────────────────────────────────────────────────

    #[test]
    fn tag_term_key_only() {
        let term = TagTerm::parse("env").unwrap();
        assert_eq!(term.key, "env");
        assert!(term.value.is_none());
    }

    #[test]
    fn tag_term_key_value() {
        let term = TagTerm::parse("env:ci").unwrap();
        assert_eq!(term.key, "env");
        assert_eq!(term.value.as_deref(), Some("ci"));
    }

    #[test]
    fn tag_term_empty_key_rejected() {
        assert!(TagTerm::parse(":ci").is_err());
        assert!(TagTerm::parse("").is_err());
    }

    #[test]
    fn tag_filter_requires_all_terms() {
        let filter = TagFilter::parse_terms(["env:ci", "owner"]).unwrap();
        let mut tags = HashMap::new();
        tags.insert("env".to_string(), "ci".to_string());
        assert!(!filter.matches(&tags));
        tags.insert("owner".to_string(), "qa".to_string());
        assert!(filter.matches(&tags));
    }

    #[test]
    fn facts_filtered_by_tags() {
        let mut with_tag = observed(ResourceKind::PublicAddress);
        with_tag.name = "tagged".into();
        with_tag.tags.insert("env".into(), "ci".into());
        let mut without = observed(ResourceKind::PublicAddress);
        without.name = "untagged".into();

        let filter = TagFilter::parse_terms(["env:ci"]).unwrap();
        let facts = Facts::from_records([with_tag, without]).filtered(&filter);
        assert!(facts.contains(&ResourceName::new("tagged")));
        assert!(!facts.contains(&ResourceName::new("untagged")));
    }
}
