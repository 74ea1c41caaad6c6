//! WoT Thing Description vocabulary tables
//!
//! This module defines the member names and operation types the validator and
//! the structural mutation operators rely on.

/// JSON-LD context IRIs that identify a Thing Description or Thing Model.
///
/// These are vocabulary identifiers, not schema locations.
pub const TD_CONTEXT_IRIS: &[&str] = &[
    "https://www.w3.org/2019/wot/td/v1",
    "https://www.w3.org/2022/wot/td/v1.1",
    "http://www.w3.org/ns/td",
];

/// Marker inside `@type` that turns a document into a Thing Model
pub const THING_MODEL_MARKER: &str = "tm:ThingModel";

/// Members every Thing Description must carry
pub const TD_REQUIRED_MEMBERS: &[&str] = &["@context", "title", "security", "securityDefinitions"];

/// Members every Thing Model must carry
pub const TM_REQUIRED_MEMBERS: &[&str] = &["@context", "@type"];

/// Interaction affordance collections at the document root
pub const AFFORDANCE_COLLECTIONS: &[&str] = &["properties", "actions", "events"];

/// Operation types valid on a root-level form
pub const THING_OPERATIONS: &[&str] = &[
    "readallproperties",
    "writeallproperties",
    "readmultipleproperties",
    "writemultipleproperties",
    "observeallproperties",
    "unobserveallproperties",
    "subscribeallevents",
    "unsubscribeallevents",
    "queryallactions",
];

/// Operation types valid on a property form
pub const PROPERTY_OPERATIONS: &[&str] = &[
    "readproperty",
    "writeproperty",
    "observeproperty",
    "unobserveproperty",
];

/// Operation types valid on an action form
pub const ACTION_OPERATIONS: &[&str] = &["invokeaction", "queryaction", "cancelaction"];

/// Operation types valid on an event form
pub const EVENT_OPERATIONS: &[&str] = &["subscribeevent", "unsubscribeevent"];

/// Operation types accepted for the affordance collection `collection`.
///
/// `None` stands for the document root.
pub fn operations_for(collection: Option<&str>) -> &'static [&'static str] {
    match collection {
        None => THING_OPERATIONS,
        Some("properties") => PROPERTY_OPERATIONS,
        Some("actions") => ACTION_OPERATIONS,
        Some("events") => EVENT_OPERATIONS,
        Some(_) => &[],
    }
}

/// Check if an IRI identifies the TD vocabulary
pub fn is_td_context(iri: &str) -> bool {
    TD_CONTEXT_IRIS.contains(&iri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_td_context() {
        assert!(is_td_context("https://www.w3.org/2019/wot/td/v1"));
        assert!(is_td_context("https://www.w3.org/2022/wot/td/v1.1"));
        assert!(!is_td_context("https://www.w3.org/2019/wot/td/v2"));
        assert!(!is_td_context("https://saref.etsi.org/core/"));
    }

    #[test]
    fn test_operations_for_levels() {
        assert!(operations_for(None).contains(&"readallproperties"));
        assert!(operations_for(Some("properties")).contains(&"writeproperty"));
        assert!(operations_for(Some("actions")).contains(&"invokeaction"));
        assert!(operations_for(Some("events")).contains(&"subscribeevent"));
        assert!(!operations_for(Some("events")).contains(&"readproperty"));
        assert!(operations_for(Some("links")).is_empty());
    }
}
