//! Client-side form state, independent of any rendering layer.
//!
//! The renderer owns two switches: "has aid" and "has aid-bis". Aid-bis only
//! means something while aid is on, so the reachable states are
//! `{off,off}`, `{on,off}` and `{on,on}`. Which pending fields are shown is a
//! pure function of those switches.

use std::collections::HashMap;

use serde_json::{Map, Value};

use exped_types::{group_of, FieldGroup, FieldKind, PendingField, AID_BIS_FLAG};

/// The two switches. Starts `{off,off}` on every load; never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Toggles {
    has_aid: bool,
    has_aid_bis: bool,
}

impl Toggles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_aid(&self) -> bool {
        self.has_aid
    }

    pub fn has_aid_bis(&self) -> bool {
        self.has_aid_bis
    }

    /// Flip "has aid". Turning it off also turns aid-bis off.
    pub fn toggle_aid(&mut self) {
        self.set_aid(!self.has_aid);
    }

    pub fn set_aid(&mut self, on: bool) {
        self.has_aid = on;
        if !on {
            self.has_aid_bis = false;
        }
    }

    /// Flip "has aid-bis". Ignored while aid is off (the switch is hidden).
    pub fn toggle_aid_bis(&mut self) {
        self.set_aid_bis(!self.has_aid_bis);
    }

    pub fn set_aid_bis(&mut self, on: bool) {
        if self.has_aid {
            self.has_aid_bis = on;
        }
    }

    /// Value sent for the aid-bis flag column.
    pub fn aid_bis_flag(&self) -> bool {
        self.has_aid && self.has_aid_bis
    }

    pub fn shows(&self, group: FieldGroup) -> bool {
        match group {
            FieldGroup::Base => true,
            FieldGroup::Aid => self.has_aid,
            FieldGroup::AidBis => self.aid_bis_flag(),
        }
    }
}

/// Fields to render under the current switches, in the order given.
pub fn visible_fields<'a>(toggles: &Toggles, fields: &'a [PendingField]) -> Vec<&'a PendingField> {
    fields
        .iter()
        .filter(|f| toggles.shows(group_of(&f.name)))
        .collect()
}

/// Build the `data` object for a submit request.
///
/// The aid-bis flag always goes first; then each visible field with a
/// non-blank value, trimmed. Values for hidden fields are left out even if
/// the user typed them before switching a toggle off.
pub fn build_submission(
    toggles: &Toggles,
    visible: &[&PendingField],
    values: &HashMap<String, String>,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(AID_BIS_FLAG.to_string(), Value::Bool(toggles.aid_bis_flag()));

    for field in visible {
        let Some(raw) = values.get(&field.name) else { continue };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        data.insert(field.name.clone(), Value::String(trimmed.to_string()));
    }
    data
}

pub fn help_text(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Date => "Formato: AAAA-MM-DD",
        FieldKind::Number => "Puedes usar decimales.",
        _ => "",
    }
}

/// User-facing status line of the form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormStatus {
    InvalidLink,
    Loading,
    LoadFailed(String),
    /// Nothing pending.
    Complete,
    Ready,
    Sending,
    Sent,
    SendFailed(String),
}

impl FormStatus {
    /// Status after the pending-field fetch returned.
    pub fn after_load(result: Result<&[PendingField], String>) -> Self {
        match result {
            Ok([]) => FormStatus::Complete,
            Ok(_) => FormStatus::Ready,
            Err(e) => FormStatus::LoadFailed(e),
        }
    }

    pub fn message(&self) -> String {
        match self {
            FormStatus::InvalidLink => "Token no válido.".into(),
            FormStatus::Loading => "Cargando…".into(),
            FormStatus::LoadFailed(e) if e.is_empty() => "No se pudo cargar el formulario.".into(),
            FormStatus::LoadFailed(e) => e.clone(),
            FormStatus::Complete => "Este expediente ya tiene toda la información necesaria.".into(),
            FormStatus::Ready => "Rellena únicamente los campos solicitados.".into(),
            FormStatus::Sending => "Enviando…".into(),
            FormStatus::Sent => "Datos enviados correctamente. Ya puedes cerrar esta página.".into(),
            FormStatus::SendFailed(e) if e.is_empty() => "Error al guardar.".into(),
            FormStatus::SendFailed(e) => e.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exped_types::lookup;
    use serde_json::json;

    fn pending(names: &[&str]) -> Vec<PendingField> {
        names
            .iter()
            .map(|n| {
                lookup(n).map(|f| f.pending_field()).unwrap_or(PendingField {
                    name: n.to_string(),
                    label: n.to_string(),
                    kind: FieldKind::Text,
                })
            })
            .collect()
    }

    fn names<'a>(fields: &[&'a PendingField]) -> Vec<&'a str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn toggle_state_machine() {
        let mut t = Toggles::new();
        t.toggle_aid_bis();
        assert_eq!(t, Toggles::new(), "aid-bis cannot turn on without aid");

        t.toggle_aid();
        t.toggle_aid_bis();
        assert!(t.has_aid() && t.has_aid_bis());

        t.toggle_aid();
        assert!(!t.has_aid() && !t.has_aid_bis(), "turning aid off clears aid-bis");

        t.toggle_aid();
        assert!(!t.has_aid_bis(), "aid-bis does not come back on its own");
    }

    #[test]
    fn aid_bis_never_on_without_aid() {
        let mut t = Toggles::new();
        t.set_aid_bis(true);
        assert!(!t.has_aid_bis());

        t.set_aid(true);
        t.set_aid_bis(true);
        t.set_aid(false);
        t.set_aid_bis(true);
        assert!(!t.has_aid() && !t.has_aid_bis());
        assert!(!t.aid_bis_flag());
    }

    #[test]
    fn visibility_follows_switches() {
        let fields = pending(&["nif_entidad", "ayuda_rehab", "cuantia_bisayuda", "custom_col"]);
        let mut t = Toggles::new();
        assert_eq!(names(&visible_fields(&t, &fields)), ["nif_entidad", "custom_col"]);

        t.set_aid(true);
        assert_eq!(names(&visible_fields(&t, &fields)), ["nif_entidad", "ayuda_rehab", "custom_col"]);

        t.set_aid_bis(true);
        assert_eq!(visible_fields(&t, &fields).len(), 4);
    }

    #[test]
    fn submission_sends_flag_and_visible_trimmed_values() {
        let fields = pending(&["nif_entidad", "ayuda_rehab", "ent_bisayudabis"]);
        let mut t = Toggles::new();
        t.set_aid(true);

        let values: HashMap<String, String> = [
            ("nif_entidad", "  B123 "),
            ("ayuda_rehab", "   "),
            ("ent_bisayudabis", "hidden"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let visible = visible_fields(&t, &fields);
        let data = build_submission(&t, &visible, &values);
        assert_eq!(Value::Object(data), json!({"ayuda_bisrehab": false, "nif_entidad": "B123"}));
    }

    #[test]
    fn flag_true_only_with_both_switches() {
        let mut t = Toggles::new();
        t.set_aid(true);
        t.set_aid_bis(true);
        let data = build_submission(&t, &[], &HashMap::new());
        assert_eq!(data.get(AID_BIS_FLAG), Some(&json!(true)));
    }

    #[test]
    fn status_after_load() {
        let none: Vec<PendingField> = Vec::new();
        assert_eq!(FormStatus::after_load(Ok(none.as_slice())), FormStatus::Complete);
        let fields = pending(&["nif_entidad"]);
        assert_eq!(FormStatus::after_load(Ok(fields.as_slice())), FormStatus::Ready);
        assert_eq!(
            FormStatus::after_load(Err(String::new())).message(),
            "No se pudo cargar el formulario."
        );
    }

    #[test]
    fn help_texts() {
        assert_eq!(help_text(FieldKind::Date), "Formato: AAAA-MM-DD");
        assert_eq!(help_text(FieldKind::Email), "");
    }
}
