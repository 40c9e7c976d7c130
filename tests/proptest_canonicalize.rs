//! Property-based tests using proptest
//!
//! These tests check canonicalization stability, comparator reflexivity and
//! self-link equivalence over randomized resources.

use gdcl::dcl::canonicalize::{canonicalize_desired, canonicalize_new_state};
use gdcl::dcl::compare::{compare, self_links_equal};
use gdcl::dcl::diff::diff;
use gdcl::dcl::{FieldSchema, FieldType, Resource, ResourceSchema, Value};
use gdcl::resource::get_resource;
use proptest::prelude::*;

fn route_schema() -> &'static ResourceSchema {
    &get_resource("Route").expect("Route is registered").schema
}

/// Either the short or the full URL form of a network reference
fn arb_network() -> impl Strategy<Value = String> {
    (prop_oneof![Just("default"), Just("vpc-a"), Just("vpc-b")], any::<bool>()).prop_map(|(name, full)| {
        let short = format!("projects/test-project/global/networks/{}", name);
        if full {
            format!("https://www.googleapis.com/compute/v1/{}", short)
        } else {
            short
        }
    })
}

/// Generate arbitrary route data, every field optional
fn arb_route() -> impl Strategy<Value = Resource> {
    (
        prop::option::of("[a-z][a-z0-9-]{0,10}"),
        prop::option::of(arb_network()),
        prop::option::of(prop_oneof![Just("0.0.0.0/0"), Just("10.0.0.0/8")]),
        prop::option::of(0i64..2000),
        prop::option::of(prop::collection::vec("[a-c]", 0..4)),
        prop::option::of("10\\.0\\.0\\.[1-3]"),
        prop::option::of(Just("default-internet-gateway")),
        prop::option::of("[a-z ]{0,8}"),
    )
        .prop_map(
            |(name, network, dest, priority, tags, hop_ip, gateway, description)| {
                let mut route = Resource::new("Route").with("project", "test-project");
                if let Some(v) = name {
                    route.set("name", v);
                }
                if let Some(v) = network {
                    route.set("network", v);
                }
                if let Some(v) = dest {
                    route.set("destRange", v);
                }
                if let Some(v) = priority {
                    route.set("priority", v);
                }
                if let Some(v) = tags {
                    route.set("tags", v);
                }
                if let Some(v) = hop_ip {
                    route.set("nextHopIp", v);
                }
                if let Some(v) = gateway {
                    route.set("nextHopGateway", v);
                }
                if let Some(v) = description {
                    route.set("description", v);
                }
                route
            },
        )
}

proptest! {
    /// Canonicalizing desired state twice against the same initial state changes nothing
    #[test]
    fn desired_canonicalization_is_stable(raw in arb_route(), initial in prop::option::of(arb_route())) {
        let schema = route_schema();
        let once = canonicalize_desired(schema, &raw, initial.as_ref());
        let twice = canonicalize_desired(schema, &once, initial.as_ref());
        prop_assert_eq!(once, twice);
    }

    /// Canonicalizing new state twice against the same desired state changes nothing
    #[test]
    fn new_state_canonicalization_is_stable(server in arb_route(), desired in arb_route()) {
        let schema = route_schema();
        let once = canonicalize_new_state(schema, &server, &desired);
        let twice = canonicalize_new_state(schema, &once, &desired);
        prop_assert_eq!(once, twice);
    }

    /// When desired names a next hop, exactly one hop it names survives
    #[test]
    fn oneof_collapses_to_one_member(raw in arb_route(), initial in arb_route()) {
        let schema = route_schema();
        let is_set = |r: &Resource, f: &FieldSchema| r.get(&f.name).is_some_and(|v| !v.is_empty());
        let hops: Vec<&FieldSchema> = schema.fields.iter().filter(|f| f.oneof.is_some()).collect();
        prop_assume!(hops.iter().any(|f| is_set(&raw, f)));

        let canonical = canonicalize_desired(schema, &raw, Some(&initial));
        let kept: Vec<&&FieldSchema> = hops.iter().filter(|f| is_set(&canonical, f)).collect();
        prop_assert_eq!(kept.len(), 1, "next hops in {:?}", canonical);
        prop_assert!(is_set(&raw, kept[0]));
    }

    /// Every value compares equal to itself
    #[test]
    fn compare_is_reflexive(route in arb_route()) {
        let schema = route_schema();
        for field in &schema.fields {
            let value = route.get(&field.name);
            prop_assert!(!compare(value, value, field), "{} differs from itself", field.name);
        }
        prop_assert!(diff(schema, &route, &route).is_empty());
    }

    /// A resource reference equals its full URL form
    #[test]
    fn self_link_forms_are_equal(project in "[a-z][a-z0-9-]{5,20}", network in "[a-z][a-z0-9-]{0,20}") {
        let short = format!("projects/{}/global/networks/{}", project, network);
        let full = format!("https://www.googleapis.com/compute/v1/{}", short);
        prop_assert!(self_links_equal(&short, &full));
        prop_assert!(self_links_equal(&network, &full));

        let field = FieldSchema::new("network", FieldType::SelfLink);
        prop_assert!(!compare(
            Some(&Value::String(short)),
            Some(&Value::String(full)),
            &field
        ));
    }
}
