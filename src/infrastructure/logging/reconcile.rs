use serde_json::{Map, Value};

use crate::domain::models::LogRecord;

/// Decide which context a record carries: its own or the defaults
///
/// When the record's fields include at least one key the defaults do not
/// know, the caller supplied its own context and every default key is
/// removed. Otherwise the missing default keys are filled in, keeping any
/// value the caller set. This is an either/or choice, not a merge.
pub fn reconcile_extra(record: &mut LogRecord, defaults: &Map<String, Value>) {
    let extra = &mut record.extra;
    let caller_context = !extra.is_empty() && extra.keys().any(|key| !defaults.contains_key(key));

    if caller_context {
        for key in defaults.keys() {
            extra.remove(key);
        }
    } else {
        for (key, value) in defaults {
            extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}
