//! URL path templates
//!
//! `{field}` placeholders are filled from the resource. In the path part,
//! references are reduced to their last segment; in the query part the full
//! value is kept. `{scope}` expands to `global` or `regions/<location>`.

use crate::dcl::compare::short_name;
use crate::dcl::{Resource, Value};
use crate::error::{DclError, Result};

fn placeholder_value(resource: &Resource, name: &str, in_query: bool) -> Result<String> {
    if name == "scope" {
        return Ok(match resource.get_str("location") {
            None | Some("global") => "global".to_string(),
            Some(region) => format!("regions/{}", urlencoding::encode(short_name(region))),
        });
    }

    let raw = match resource.get(name) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Integer(i)) => i.to_string(),
        _ => {
            return Err(DclError::validation(
                name,
                "required to build the request URL",
            ))
        }
    };

    let part = if in_query { raw.as_str() } else { short_name(&raw) };
    Ok(urlencoding::encode(part).into_owned())
}

/// Expand every placeholder of `template` from `resource`
pub fn expand(template: &str, resource: &Resource) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            return Err(DclError::validation(template, "unterminated placeholder"));
        };
        let in_query = out.contains('?');
        out.push_str(&placeholder_value(resource, &after[..end], in_query)?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Append `key=value` to `url`, percent-encoding the value
pub fn with_query(url: &str, key: &str, value: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, sep, key, urlencoding::encode(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_uses_short_names() {
        let rule = Resource::new("FirewallPolicyRule")
            .with(
                "firewallPolicy",
                "https://www.googleapis.com/compute/v1/locations/global/firewallPolicies/123",
            )
            .with("priority", 1000i64);
        assert_eq!(
            expand(
                "locations/global/firewallPolicies/{firewallPolicy}/getRule?priority={priority}",
                &rule
            )
            .unwrap(),
            "locations/global/firewallPolicies/123/getRule?priority=1000"
        );
    }

    #[test]
    fn test_expand_query_keeps_full_value() {
        let policy = Resource::new("FirewallPolicy").with("parent", "organizations/42");
        assert_eq!(
            expand("locations/global/firewallPolicies?parentId={parent}", &policy).unwrap(),
            "locations/global/firewallPolicies?parentId=organizations%2F42"
        );
    }

    #[test]
    fn test_expand_scope() {
        let global = Resource::new("X").with("project", "p").with("location", "global");
        let regional = Resource::new("X").with("project", "p").with("location", "us-east1");
        assert_eq!(expand("projects/{project}/{scope}", &global).unwrap(), "projects/p/global");
        assert_eq!(
            expand("projects/{project}/{scope}", &regional).unwrap(),
            "projects/p/regions/us-east1"
        );
    }

    #[test]
    fn test_expand_missing_field() {
        let err = expand("projects/{project}", &Resource::new("Route")).unwrap_err();
        assert!(matches!(err, DclError::Validation { ref field, .. } if field == "project"));
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("a/b", "requestId", "x y"), "a/b?requestId=x%20y");
        assert_eq!(with_query("a?p=1", "pageToken", "t"), "a?p=1&pageToken=t");
    }
}
