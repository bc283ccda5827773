//! # Event attributes and reserved keys.
//!
//! An event travels as a flat string-keyed map of JSON scalars ([`Attributes`]).
//! The bus stamps its own metadata under the reserved `bus_*` keys listed in [`keys`].
//!
//! Matching always compares **stringified** values: strings as-is, numbers and
//! booleans by their JSON text, `null` and absent attributes as `""`.

use serde_json::Value;

/// Flat attribute map carried by every event and task.
pub type Attributes = serde_json::Map<String, Value>;

/// Reserved attribute keys injected by the bus.
pub mod keys {
    /// Event name given to `publish`.
    pub const EVENT_TYPE: &str = "bus_event_type";
    /// Globally unique event id (`<published_at>-<uuid>`).
    pub const ID: &str = "bus_id";
    /// Publish time, epoch seconds.
    pub const PUBLISHED_AT: &str = "bus_published_at";
    /// Host that published the event.
    pub const APP_HOSTNAME: &str = "bus_app_hostname";
    /// Opaque context blob from configuration.
    pub const CONTEXT: &str = "bus_context";
    /// Locale of the publishing execution context.
    pub const LOCALE: &str = "bus_locale";
    /// Timezone of the publishing execution context.
    pub const TIMEZONE: &str = "bus_timezone";
    /// Target time of a delayed publish, epoch seconds.
    pub const DELAYED_UNTIL: &str = "bus_delayed_until";
    /// Time the driver fanned the event out, epoch seconds.
    pub const DRIVEN_AT: &str = "bus_driven_at";
    /// Time the rider executed the subscription, epoch seconds.
    pub const EXECUTED_AT: &str = "bus_executed_at";
    /// Namespace owning the subscription a rider task targets.
    pub const RIDER_APP_KEY: &str = "bus_rider_app_key";
    /// Subscription key a rider task targets.
    pub const RIDER_SUB_KEY: &str = "bus_rider_sub_key";
    /// Queue the rider task was delivered to.
    pub const RIDER_QUEUE: &str = "bus_rider_queue";
    /// Class name recorded on the subscription.
    pub const RIDER_CLASS_NAME: &str = "bus_rider_class_name";
    /// Proxy the worker resolves to run the task.
    pub const CLASS_PROXY: &str = "bus_class_proxy";
}

/// Stringifies an attribute value the way filters compare it.
///
/// # Example
/// ```
/// use queuebus::attributes::stringify;
/// use serde_json::json;
///
/// assert_eq!(stringify(Some(&json!("cat"))), "cat");
/// assert_eq!(stringify(Some(&json!(12))), "12");
/// assert_eq!(stringify(Some(&json!(true))), "true");
/// assert_eq!(stringify(Some(&json!(null))), "");
/// assert_eq!(stringify(None), "");
/// ```
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Reads an attribute as an integer, accepting numbers and numeric strings.
pub fn as_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads an attribute as a non-empty string.
pub fn non_empty(attributes: &Attributes, key: &str) -> Option<String> {
    let s = stringify(attributes.get(key));
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_int_accepts_numeric_strings() {
        assert_eq!(as_int(Some(&json!(5))), Some(5));
        assert_eq!(as_int(Some(&json!("15"))), Some(15));
        assert_eq!(as_int(Some(&json!("x"))), None);
        assert_eq!(as_int(Some(&json!(1.5))), None);
        assert_eq!(as_int(None), None);
    }

    #[test]
    fn test_non_empty_skips_blank_and_null() {
        let mut attrs = Attributes::new();
        attrs.insert("a".into(), json!(""));
        attrs.insert("b".into(), Value::Null);
        attrs.insert("c".into(), json!("app"));
        assert_eq!(non_empty(&attrs, "a"), None);
        assert_eq!(non_empty(&attrs, "b"), None);
        assert_eq!(non_empty(&attrs, "missing"), None);
        assert_eq!(non_empty(&attrs, "c").as_deref(), Some("app"));
    }
}
