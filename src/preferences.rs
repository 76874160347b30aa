//! User preferences and their store.
//!
//! Preferences live under the `user_profile` key as camelCase JSON. They are
//! only changed through [`PreferenceStore::update`]; everything else reads.

use serde::{Deserialize, Serialize};

use crate::storage::{SharedKeyValueStore, USER_PROFILE_KEY};

/// How much energy the user has right now.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    /// Tiny tasks, slower speech.
    Low,
    #[default]
    Medium,
    /// Big wins.
    High,
}

impl EnergyLevel {
    /// Speech rate used when announcing steps.
    pub fn speech_rate(self) -> f32 {
        match self {
            EnergyLevel::Low => 0.8,
            EnergyLevel::Medium | EnergyLevel::High => 1.0,
        }
    }
}

impl std::str::FromStr for EnergyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(EnergyLevel::Low),
            "medium" => Ok(EnergyLevel::Medium),
            "high" => Ok(EnergyLevel::High),
            other => Err(format!("unknown energy level: {}", other)),
        }
    }
}

/// Tone of the coaching copy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MotivationStyle {
    /// Warm & supportive
    #[default]
    Supportive,
    /// Direct & concise
    Direct,
    /// Fun & gamified
    Gamified,
}

impl std::str::FromStr for MotivationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supportive" => Ok(MotivationStyle::Supportive),
            "direct" => Ok(MotivationStyle::Direct),
            "gamified" => Ok(MotivationStyle::Gamified),
            other => Err(format!("unknown motivation style: {}", other)),
        }
    }
}

/// User-configurable settings, sent along with every decomposition request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub energy_level: EnergyLevel,
    pub dyslexia_mode: bool,
    pub motivation_style: MotivationStyle,
    pub max_steps_visible: u32,
    pub prefers_voice: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            energy_level: EnergyLevel::Medium,
            dyslexia_mode: false,
            motivation_style: MotivationStyle::Supportive,
            max_steps_visible: 5,
            prefers_voice: false,
        }
    }
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dyslexia_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation_style: Option<MotivationStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps_visible: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefers_voice: Option<bool>,
}

impl UserPreferences {
    /// Shallow merge of `update` over `self`.
    pub fn merged(mut self, update: &PreferencesUpdate) -> Self {
        if let Some(v) = update.energy_level {
            self.energy_level = v;
        }
        if let Some(v) = update.dyslexia_mode {
            self.dyslexia_mode = v;
        }
        if let Some(v) = update.motivation_style {
            self.motivation_style = v;
        }
        if let Some(v) = update.max_steps_visible {
            self.max_steps_visible = v;
        }
        if let Some(v) = update.prefers_voice {
            self.prefers_voice = v;
        }
        self
    }
}

/// Reads and writes [`UserPreferences`] through a key-value store.
#[derive(Clone)]
pub struct PreferenceStore {
    store: SharedKeyValueStore,
}

impl PreferenceStore {
    pub fn new(store: SharedKeyValueStore) -> Self {
        Self { store }
    }

    /// Current preferences; defaults when nothing (or garbage) is stored.
    pub fn get(&self) -> UserPreferences {
        match self.store.get(USER_PROFILE_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable {}: {}", USER_PROFILE_KEY, e);
                UserPreferences::default()
            }),
            None => UserPreferences::default(),
        }
    }

    /// Merge `update` over the latest persisted value, persist and return it.
    pub fn update(&self, update: &PreferencesUpdate) -> UserPreferences {
        let merged = self.get().merged(update);
        match serde_json::to_string(&merged) {
            Ok(raw) => self.store.set(USER_PROFILE_KEY, &raw),
            Err(e) => tracing::warn!("Failed to serialize preferences: {}", e),
        }
        merged
    }
}

impl std::str::FromStr for PreferencesUpdate {
    type Err = String;

    /// Parse `key=value` pairs separated by whitespace, e.g.
    /// `energy=low dyslexia=on style=direct steps=3 voice=off`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut update = PreferencesUpdate::default();
        for pair in s.split_whitespace() {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected key=value, got {}", pair))?;
            match key.to_lowercase().as_str() {
                "energy" => update.energy_level = Some(value.parse()?),
                "dyslexia" => update.dyslexia_mode = Some(parse_switch(value)?),
                "style" => update.motivation_style = Some(value.parse()?),
                "steps" => {
                    let steps: u32 = value
                        .parse()
                        .map_err(|_| format!("steps must be a positive number, got {}", value))?;
                    if steps == 0 {
                        return Err("steps must be at least 1".to_string());
                    }
                    update.max_steps_visible = Some(steps);
                }
                "voice" => update.prefers_voice = Some(parse_switch(value)?),
                other => return Err(format!("unknown preference: {}", other)),
            }
        }
        Ok(update)
    }
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => Err(format!("expected on/off, got {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn store() -> (Arc<MemoryStore>, PreferenceStore) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), PreferenceStore::new(kv))
    }

    #[test]
    fn test_defaults_when_empty() {
        let (_, prefs) = store();
        assert_eq!(prefs.get(), UserPreferences::default());
        assert_eq!(prefs.get().max_steps_visible, 5);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = serde_json::to_value(UserPreferences::default()).unwrap();
        assert_eq!(json["energyLevel"], "medium");
        assert_eq!(json["motivationStyle"], "supportive");
        assert_eq!(json["maxStepsVisible"], 5);
        assert_eq!(json["dyslexiaMode"], false);
        assert_eq!(json["prefersVoice"], false);
    }

    #[test]
    fn test_update_merges_and_persists() {
        let (kv, prefs) = store();
        let updated = prefs.update(&PreferencesUpdate {
            energy_level: Some(EnergyLevel::Low),
            ..Default::default()
        });
        assert_eq!(updated.energy_level, EnergyLevel::Low);
        assert_eq!(updated.motivation_style, MotivationStyle::Supportive);

        let updated = prefs.update(&PreferencesUpdate {
            dyslexia_mode: Some(true),
            ..Default::default()
        });
        assert_eq!(updated.energy_level, EnergyLevel::Low);
        assert!(updated.dyslexia_mode);

        let raw = kv.get(USER_PROFILE_KEY).unwrap();
        assert!(raw.contains("\"energyLevel\":\"low\""));
    }

    #[test]
    fn test_update_reads_latest_persisted_value() {
        let (kv, prefs) = store();
        kv.set(USER_PROFILE_KEY, r#"{"energyLevel":"high","prefersVoice":true}"#);
        let updated = prefs.update(&PreferencesUpdate {
            max_steps_visible: Some(3),
            ..Default::default()
        });
        assert_eq!(updated.energy_level, EnergyLevel::High);
        assert!(updated.prefers_voice);
        assert_eq!(updated.max_steps_visible, 3);
    }

    #[test]
    fn test_corrupt_value_reads_as_defaults() {
        let (kv, prefs) = store();
        kv.set(USER_PROFILE_KEY, "not json");
        assert_eq!(prefs.get(), UserPreferences::default());
    }

    #[test]
    fn test_speech_rate() {
        assert_eq!(EnergyLevel::Low.speech_rate(), 0.8);
        assert_eq!(EnergyLevel::Medium.speech_rate(), 1.0);
        assert_eq!(EnergyLevel::High.speech_rate(), 1.0);
    }

    #[test]
    fn test_parse_options() {
        assert_eq!("LOW".parse::<EnergyLevel>(), Ok(EnergyLevel::Low));
        assert_eq!("direct".parse::<MotivationStyle>(), Ok(MotivationStyle::Direct));
        assert!("sleepy".parse::<EnergyLevel>().is_err());
    }

    #[test]
    fn test_parse_update() {
        let update: PreferencesUpdate = "energy=low dyslexia=on steps=3".parse().unwrap();
        assert_eq!(update.energy_level, Some(EnergyLevel::Low));
        assert_eq!(update.dyslexia_mode, Some(true));
        assert_eq!(update.max_steps_visible, Some(3));
        assert_eq!(update.motivation_style, None);

        assert!("steps=0".parse::<PreferencesUpdate>().is_err());
        assert!("mood=great".parse::<PreferencesUpdate>().is_err());
        assert!("voice".parse::<PreferencesUpdate>().is_err());
        assert_eq!("".parse::<PreferencesUpdate>(), Ok(PreferencesUpdate::default()));
    }
}
