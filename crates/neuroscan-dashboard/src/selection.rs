//! 患者选择锁存
//!
//! 初始为空；患者列表首次非空时选中第一条（最新创建）。一旦有了选择，
//! 列表再怎么变化都不会自动清除或改写，只有用户点击才会改变。

use neuroscan_core::{NeuroscanError, Patient, Result};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionLatch {
    selected: Option<Uuid>,
}

impl SelectionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    /// 观察新获取的患者列表，发生自动选择时返回 `true`
    pub fn observe(&mut self, patients: &[Patient]) -> bool {
        if self.selected.is_some() {
            return false;
        }
        match patients.first() {
            Some(first) => {
                self.selected = Some(first.id);
                true
            }
            None => false,
        }
    }

    /// 用户点击某一行；只接受当前列表中的患者，选择变化时返回 `true`
    pub fn select(&mut self, patient_id: Uuid, patients: &[Patient]) -> Result<bool> {
        if !patients.iter().any(|p| p.id == patient_id) {
            return Err(NeuroscanError::NotFound(format!(
                "Patient {} is not in the current list",
                patient_id
            )));
        }
        let changed = self.selected != Some(patient_id);
        self.selected = Some(patient_id);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn patient(label: &str, day: u32) -> Patient {
        let at = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        Patient {
            id: Uuid::new_v4(),
            patient_id: label.to_string(),
            medical_history: None,
            allergies: None,
            current_medications: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            user_id: Uuid::nil(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_first_patient_selected_for_every_list_size() {
        for size in 1..6 {
            let patients: Vec<Patient> = (0..size).map(|i| patient("P", 28 - i)).collect();
            let mut latch = SelectionLatch::new();
            assert!(latch.observe(&patients));
            assert_eq!(latch.selected(), Some(patients[0].id));
        }
    }

    #[test]
    fn test_empty_list_keeps_selection_empty() {
        let mut latch = SelectionLatch::new();
        assert!(!latch.observe(&[]));
        assert_eq!(latch.selected(), None);
    }

    #[test]
    fn test_latch_survives_list_changes() {
        let (a1, a2) = (patient("A1", 2), patient("A2", 1));
        let mut latch = SelectionLatch::new();
        latch.observe(&[a1.clone(), a2.clone()]);
        latch.select(a2.id, &[a1.clone(), a2.clone()]).unwrap();

        // 新患者排在最前，不影响已有选择
        let a3 = patient("A3", 3);
        assert!(!latch.observe(&[a3.clone(), a1.clone(), a2.clone()]));
        assert_eq!(latch.selected(), Some(a2.id));

        // 列表变空也不清除
        assert!(!latch.observe(&[]));
        assert_eq!(latch.selected(), Some(a2.id));
    }

    #[test]
    fn test_select_rejects_unknown_patient() {
        let a1 = patient("A1", 1);
        let mut latch = SelectionLatch::new();
        latch.observe(&[a1.clone()]);

        let err = latch.select(Uuid::new_v4(), &[a1.clone()]).unwrap_err();
        assert!(matches!(err, NeuroscanError::NotFound(_)));
        assert_eq!(latch.selected(), Some(a1.id));

        assert!(!latch.select(a1.id, &[a1.clone()]).unwrap());
    }
}
