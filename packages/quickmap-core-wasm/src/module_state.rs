use std::cell::RefCell;

use lazy_static::lazy_static;
use parking_lot::ReentrantMutex;
use serde_json::Value;

/// Per-page-session values held for the lifetime of the page. Each field is
/// overwritten wholesale on update; a second upload replaces the first.
pub struct ModuleState {
    /// Basemap features, loaded once at startup.
    pub base_features: Option<Vec<Value>>,
    /// The designated boundary feature, selected from the basemap by
    /// attribute match.
    pub boundary: Option<Value>,
    /// Features from the most recent user upload.
    pub user_features: Option<Vec<Value>>,
}

lazy_static! {
    static ref MODULE_STATE: ReentrantMutex<RefCell<ModuleState>> =
        ReentrantMutex::new(RefCell::new(ModuleState::new()));
}

impl ModuleState {
    pub fn new() -> Self {
        ModuleState {
            base_features: None,
            boundary: None,
            user_features: None,
        }
    }

    pub fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let borrow = guard.borrow();
        f(&borrow)
    }

    pub fn with_mut<F, R>(f: F) -> R
    where
        F: FnOnce(&mut ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let mut borrow = guard.borrow_mut();
        f(&mut borrow)
    }

    /// Stores the basemap features and picks out the boundary feature whose
    /// `properties[key]` equals `value`. Returns whether a boundary was found.
    pub fn set_base_data(&mut self, features: Vec<Value>, key: &str, value: &str) -> bool {
        self.boundary = features
            .iter()
            .find(|f| {
                f.get("properties")
                    .and_then(|props| props.get(key))
                    .and_then(Value::as_str)
                    == Some(value)
            })
            .cloned();
        self.base_features = Some(features);
        self.boundary.is_some()
    }

    pub fn set_user_features(&mut self, features: Vec<Value>) {
        self.user_features = Some(features);
    }

    pub fn has_base_data(&self) -> bool {
        self.base_features.is_some() && self.boundary.is_some()
    }

    pub fn clear(&mut self) {
        self.base_features = None;
        self.boundary = None;
        self.user_features = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn country(name: &str) -> Value {
        json!({
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] },
            "properties": { "CTRY24NM": name },
        })
    }

    #[test]
    fn boundary_is_selected_by_property_match() {
        let mut state = ModuleState::new();
        let found = state.set_base_data(
            vec![country("Scotland"), country("England"), country("Wales")],
            "CTRY24NM",
            "England",
        );
        assert!(found);
        assert!(state.has_base_data());
        assert_eq!(
            state.boundary.as_ref().unwrap()["properties"]["CTRY24NM"],
            "England"
        );
    }

    #[test]
    fn missing_boundary_leaves_state_incomplete() {
        let mut state = ModuleState::new();
        let found = state.set_base_data(vec![country("Scotland")], "CTRY24NM", "England");
        assert!(!found);
        assert!(!state.has_base_data());
        assert!(state.base_features.is_some());
    }

    #[test]
    fn user_features_are_replaced_wholesale() {
        let mut state = ModuleState::new();
        state.set_user_features(vec![json!({ "id": 1 }), json!({ "id": 2 })]);
        state.set_user_features(vec![json!({ "id": 3 })]);
        assert_eq!(state.user_features.as_ref().unwrap().len(), 1);
        assert_eq!(state.user_features.as_ref().unwrap()[0]["id"], 3);
    }

    #[test]
    fn clear_drops_everything() {
        let mut state = ModuleState::new();
        state.set_base_data(vec![country("England")], "CTRY24NM", "England");
        state.set_user_features(vec![json!({})]);
        state.clear();
        assert!(!state.has_base_data());
        assert!(state.user_features.is_none());
    }
}
