//! Triage Gate: the safety screen in front of consultation creation.
//!
//! Any selected red flag mandates emergency referral and blocks submission outright. There is
//! no "proceed anyway": [`evaluate`] checks red flags before anything else, and a
//! [`BlockedTriage`] carries no payload that could be turned back into a submission. The only
//! thing a caller can do with it is [`BlockedTriage::abandon`].
//!
//! Pediatric flags are only *offered* while the subject is under the adult age. [`TriageForm`]
//! models the interactive intake: it recomputes pediatric visibility whenever the subject
//! changes and drops the "none apply" confirmation as soon as any flag is selected.

use crate::directory::{age_in_years, PersonRecord};
use crate::error::{CoreError, CoreResult};
use crate::types::{MembershipId, NonEmptyText, PersonId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Which of the three independent red-flag sets a flag belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedFlagCategory {
    General,
    Pediatric,
    MentalHealth,
}

impl RedFlagCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Pediatric => "pediatric",
            Self::MentalHealth => "mental_health",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedFlag {
    // general
    ChestPain,
    DifficultyBreathing,
    StrokeSymptoms,
    SevereBleeding,
    LossOfConsciousness,
    SevereAllergicReaction,
    SuddenSevereHeadache,
    SevereAbdominalPain,
    // pediatric
    InfantFever,
    UnresponsiveChild,
    PediatricDehydration,
    PediatricBreathingDistress,
    // mental health
    SelfHarmIntent,
    HarmToOthersIntent,
    AcutePsychosis,
}

impl RedFlag {
    pub const ALL: [RedFlag; 15] = [
        RedFlag::ChestPain,
        RedFlag::DifficultyBreathing,
        RedFlag::StrokeSymptoms,
        RedFlag::SevereBleeding,
        RedFlag::LossOfConsciousness,
        RedFlag::SevereAllergicReaction,
        RedFlag::SuddenSevereHeadache,
        RedFlag::SevereAbdominalPain,
        RedFlag::InfantFever,
        RedFlag::UnresponsiveChild,
        RedFlag::PediatricDehydration,
        RedFlag::PediatricBreathingDistress,
        RedFlag::SelfHarmIntent,
        RedFlag::HarmToOthersIntent,
        RedFlag::AcutePsychosis,
    ];

    pub const fn category(self) -> RedFlagCategory {
        match self {
            RedFlag::ChestPain
            | RedFlag::DifficultyBreathing
            | RedFlag::StrokeSymptoms
            | RedFlag::SevereBleeding
            | RedFlag::LossOfConsciousness
            | RedFlag::SevereAllergicReaction
            | RedFlag::SuddenSevereHeadache
            | RedFlag::SevereAbdominalPain => RedFlagCategory::General,
            RedFlag::InfantFever
            | RedFlag::UnresponsiveChild
            | RedFlag::PediatricDehydration
            | RedFlag::PediatricBreathingDistress => RedFlagCategory::Pediatric,
            RedFlag::SelfHarmIntent | RedFlag::HarmToOthersIntent | RedFlag::AcutePsychosis => {
                RedFlagCategory::MentalHealth
            }
        }
    }

    /// Patient-facing wording of the flag.
    pub const fn label(self) -> &'static str {
        match self {
            RedFlag::ChestPain => "Chest pain or chest pressure",
            RedFlag::DifficultyBreathing => "Severe difficulty breathing or shortness of breath",
            RedFlag::StrokeSymptoms => {
                "Sudden face drooping, arm weakness, or trouble speaking"
            }
            RedFlag::SevereBleeding => "Bleeding that will not stop",
            RedFlag::LossOfConsciousness => "Fainting or loss of consciousness",
            RedFlag::SevereAllergicReaction => "Swelling of the lips, tongue, or throat",
            RedFlag::SuddenSevereHeadache => "Sudden, severe headache unlike any before",
            RedFlag::SevereAbdominalPain => "Severe abdominal pain",
            RedFlag::InfantFever => "Fever in an infant under 3 months old",
            RedFlag::UnresponsiveChild => "Child is unusually sleepy or hard to wake",
            RedFlag::PediatricDehydration => "No wet diaper or urination in 8 hours",
            RedFlag::PediatricBreathingDistress => {
                "Child is grunting, wheezing, or pulling in at the ribs to breathe"
            }
            RedFlag::SelfHarmIntent => "Thoughts of harming or killing yourself",
            RedFlag::HarmToOthersIntent => "Thoughts of harming someone else",
            RedFlag::AcutePsychosis => "Seeing or hearing things that others do not",
        }
    }

    pub fn in_category(category: RedFlagCategory) -> impl Iterator<Item = RedFlag> {
        RedFlag::ALL
            .into_iter()
            .filter(move |flag| flag.category() == category)
    }
}

impl RedFlag {
    /// Stable snake_case code, matching the serialized form.
    pub const fn code(self) -> &'static str {
        match self {
            RedFlag::ChestPain => "chest_pain",
            RedFlag::DifficultyBreathing => "difficulty_breathing",
            RedFlag::StrokeSymptoms => "stroke_symptoms",
            RedFlag::SevereBleeding => "severe_bleeding",
            RedFlag::LossOfConsciousness => "loss_of_consciousness",
            RedFlag::SevereAllergicReaction => "severe_allergic_reaction",
            RedFlag::SuddenSevereHeadache => "sudden_severe_headache",
            RedFlag::SevereAbdominalPain => "severe_abdominal_pain",
            RedFlag::InfantFever => "infant_fever",
            RedFlag::UnresponsiveChild => "unresponsive_child",
            RedFlag::PediatricDehydration => "pediatric_dehydration",
            RedFlag::PediatricBreathingDistress => "pediatric_breathing_distress",
            RedFlag::SelfHarmIntent => "self_harm_intent",
            RedFlag::HarmToOthersIntent => "harm_to_others_intent",
            RedFlag::AcutePsychosis => "acute_psychosis",
        }
    }
}

impl std::str::FromStr for RedFlag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        RedFlag::ALL
            .into_iter()
            .find(|flag| flag.code() == wanted)
            .ok_or_else(|| CoreError::Validation(format!("unknown red flag '{}'", s.trim())))
    }
}

impl fmt::Display for RedFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three independent red-flag selection sets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlagSelections {
    #[serde(default)]
    pub general: BTreeSet<RedFlag>,
    #[serde(default)]
    pub pediatric: BTreeSet<RedFlag>,
    #[serde(default)]
    pub mental_health: BTreeSet<RedFlag>,
}

impl RedFlagSelections {
    /// Adds `flag` to the set of its category. Returns false if it was already selected.
    pub fn insert(&mut self, flag: RedFlag) -> bool {
        self.set_mut(flag.category()).insert(flag)
    }

    pub fn remove(&mut self, flag: RedFlag) -> bool {
        self.set_mut(flag.category()).remove(&flag)
    }

    pub fn contains(&self, flag: RedFlag) -> bool {
        self.set(flag.category()).contains(&flag)
    }

    pub fn clear_category(&mut self, category: RedFlagCategory) {
        self.set_mut(category).clear();
    }

    /// True when no flag is selected in any set.
    pub fn is_empty(&self) -> bool {
        self.general.is_empty() && self.pediatric.is_empty() && self.mental_health.is_empty()
    }

    /// Union of all three sets.
    pub fn union(&self) -> BTreeSet<RedFlag> {
        self.general
            .iter()
            .chain(&self.pediatric)
            .chain(&self.mental_health)
            .copied()
            .collect()
    }

    /// True if a flag sits in a set other than its own category's. Such input never comes from
    /// [`TriageForm`], only from hand-built submissions.
    fn has_misfiled_flags(&self) -> bool {
        let misfiled = |set: &BTreeSet<RedFlag>, category| set.iter().any(|f| f.category() != category);
        misfiled(&self.general, RedFlagCategory::General)
            || misfiled(&self.pediatric, RedFlagCategory::Pediatric)
            || misfiled(&self.mental_health, RedFlagCategory::MentalHealth)
    }

    fn set(&self, category: RedFlagCategory) -> &BTreeSet<RedFlag> {
        match category {
            RedFlagCategory::General => &self.general,
            RedFlagCategory::Pediatric => &self.pediatric,
            RedFlagCategory::MentalHealth => &self.mental_health,
        }
    }

    fn set_mut(&mut self, category: RedFlagCategory) -> &mut BTreeSet<RedFlag> {
        match category {
            RedFlagCategory::General => &mut self.general,
            RedFlagCategory::Pediatric => &mut self.pediatric,
            RedFlagCategory::MentalHealth => &mut self.mental_health,
        }
    }
}

/// Everything the intake UI collects before a consultation may be created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeSubmission {
    pub membership_id: MembershipId,
    pub person_id: PersonId,
    pub chief_complaint: String,
    #[serde(default)]
    pub red_flags: RedFlagSelections,
    /// The explicit "none of these apply to me" checkbox.
    #[serde(default)]
    pub none_apply_confirmed: bool,
    /// The "I am currently located in a state where care can be provided" acknowledgement.
    #[serde(default)]
    pub location_acknowledged: bool,
}

/// A validated creation payload. Only [`evaluate`] can produce one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriagePayload {
    membership_id: MembershipId,
    person_id: PersonId,
    chief_complaint: NonEmptyText,
    pediatric_screened: bool,
    evaluated_on: NaiveDate,
}

impl TriagePayload {
    pub fn membership_id(&self) -> MembershipId {
        self.membership_id
    }

    pub fn person_id(&self) -> PersonId {
        self.person_id
    }

    pub fn chief_complaint(&self) -> &NonEmptyText {
        &self.chief_complaint
    }

    /// Whether pediatric flags were offered to the subject at evaluation time.
    pub fn pediatric_screened(&self) -> bool {
        self.pediatric_screened
    }

    pub fn evaluated_on(&self) -> NaiveDate {
        self.evaluated_on
    }
}

/// Terminal outcome of a screen with at least one red flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockedTriage {
    flags: Vec<RedFlag>,
}

impl BlockedTriage {
    pub const GUIDANCE: &'static str =
        "One or more of your symptoms needs emergency care. Call 911 or go to the nearest emergency room.";

    pub fn flags(&self) -> &[RedFlag] {
        &self.flags
    }

    /// Ends the intake. Nothing is created.
    pub fn abandon(self) {
        tracing::info!("triage abandoned after red flags: {:?}", self.flags);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriageDecision {
    Blocked(BlockedTriage),
    Proceed(TriagePayload),
}

impl TriageDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, TriageDecision::Blocked(_))
    }
}

/// Whether pediatric flags apply to someone born on `date_of_birth`, evaluated on `today`.
pub fn pediatric_flags_apply(date_of_birth: NaiveDate, today: NaiveDate, adult_age: u32) -> bool {
    age_in_years(date_of_birth, today) < adult_age
}

/// Evaluates an intake against the gate.
///
/// Red flags are checked first and win over everything else, including the "none apply"
/// confirmation. Only a flag-free intake is then checked for its required acknowledgements.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for a flag-free intake that lacks the chief complaint, the
/// "none apply" confirmation or the location acknowledgement.
pub fn evaluate(
    submission: &IntakeSubmission,
    date_of_birth: NaiveDate,
    today: NaiveDate,
    adult_age: u32,
) -> CoreResult<TriageDecision> {
    let flags = submission.red_flags.union();
    if !flags.is_empty() {
        return Ok(TriageDecision::Blocked(BlockedTriage {
            flags: flags.into_iter().collect(),
        }));
    }

    if !submission.none_apply_confirmed {
        return Err(CoreError::Validation(
            "confirmation that no emergency symptoms apply is required".into(),
        ));
    }
    if !submission.location_acknowledged {
        return Err(CoreError::Validation(
            "location acknowledgement is required".into(),
        ));
    }
    let chief_complaint = NonEmptyText::required("chief complaint", &submission.chief_complaint)?;

    Ok(TriageDecision::Proceed(TriagePayload {
        membership_id: submission.membership_id,
        person_id: submission.person_id,
        chief_complaint,
        pediatric_screened: pediatric_flags_apply(date_of_birth, today, adult_age),
        evaluated_on: today,
    }))
}

#[derive(Clone, Debug)]
struct Subject {
    person_id: PersonId,
    date_of_birth: NaiveDate,
}

/// Interactive intake state.
#[derive(Clone, Debug)]
pub struct TriageForm {
    membership_id: MembershipId,
    adult_age: u32,
    subject: Option<Subject>,
    pediatric_offered: bool,
    chief_complaint: String,
    selections: RedFlagSelections,
    none_apply_confirmed: bool,
    location_acknowledged: bool,
}

impl TriageForm {
    pub fn new(membership_id: MembershipId, adult_age: u32) -> Self {
        Self {
            membership_id,
            adult_age,
            subject: None,
            pediatric_offered: false,
            chief_complaint: String::new(),
            selections: RedFlagSelections::default(),
            none_apply_confirmed: false,
            location_acknowledged: false,
        }
    }

    /// Selects who the consultation is for and recomputes pediatric visibility.
    ///
    /// Pediatric selections are dropped when the new subject is not a child.
    pub fn select_subject(&mut self, person: &PersonRecord, today: NaiveDate) -> CoreResult<()> {
        if person.membership_id != self.membership_id {
            return Err(CoreError::Validation(
                "subject is not part of this membership".into(),
            ));
        }
        self.subject = Some(Subject {
            person_id: person.id,
            date_of_birth: person.date_of_birth,
        });
        self.pediatric_offered = pediatric_flags_apply(person.date_of_birth, today, self.adult_age);
        if !self.pediatric_offered {
            self.selections.clear_category(RedFlagCategory::Pediatric);
        }
        Ok(())
    }

    pub fn pediatric_offered(&self) -> bool {
        self.pediatric_offered
    }

    /// Flags currently shown to the user.
    pub fn offered_flags(&self) -> Vec<RedFlag> {
        RedFlag::ALL
            .into_iter()
            .filter(|flag| flag.category() != RedFlagCategory::Pediatric || self.pediatric_offered)
            .collect()
    }

    pub fn set_chief_complaint(&mut self, text: impl Into<String>) {
        self.chief_complaint = text.into();
    }

    /// Selects a red flag. Any prior "none apply" confirmation is withdrawn.
    pub fn select_flag(&mut self, flag: RedFlag) -> CoreResult<()> {
        if flag.category() == RedFlagCategory::Pediatric && !self.pediatric_offered {
            return Err(CoreError::Validation(format!(
                "'{}' is only offered for subjects under {}",
                flag.label(),
                self.adult_age
            )));
        }
        self.selections.insert(flag);
        self.none_apply_confirmed = false;
        Ok(())
    }

    pub fn deselect_flag(&mut self, flag: RedFlag) {
        self.selections.remove(flag);
    }

    /// Ticks "none of these apply". Refused while any flag is selected.
    pub fn confirm_none_apply(&mut self) -> CoreResult<()> {
        if !self.selections.is_empty() {
            return Err(CoreError::Validation(
                "cannot confirm that no emergency symptoms apply while red flags are selected"
                    .into(),
            ));
        }
        self.none_apply_confirmed = true;
        Ok(())
    }

    pub fn withdraw_none_apply(&mut self) {
        self.none_apply_confirmed = false;
    }

    pub fn acknowledge_location(&mut self, acknowledged: bool) {
        self.location_acknowledged = acknowledged;
    }

    pub fn selections(&self) -> &RedFlagSelections {
        &self.selections
    }

    pub fn is_blocked(&self) -> bool {
        !self.selections.is_empty()
    }

    /// The submission this form would send.
    pub fn submission(&self) -> CoreResult<IntakeSubmission> {
        let subject = self
            .subject
            .as_ref()
            .ok_or_else(|| CoreError::Validation("a subject must be selected".into()))?;
        Ok(IntakeSubmission {
            membership_id: self.membership_id,
            person_id: subject.person_id,
            chief_complaint: self.chief_complaint.clone(),
            red_flags: self.selections.clone(),
            none_apply_confirmed: self.none_apply_confirmed,
            location_acknowledged: self.location_acknowledged,
        })
    }

    pub fn evaluate(&self, today: NaiveDate) -> CoreResult<TriageDecision> {
        let submission = self.submission()?;
        let date_of_birth = self
            .subject
            .as_ref()
            .map(|s| s.date_of_birth)
            .ok_or_else(|| CoreError::Validation("a subject must be selected".into()))?;
        evaluate(&submission, date_of_birth, today, self.adult_age)
    }
}

/// Rejects submissions whose flags are filed under the wrong category.
pub(crate) fn check_selection_shape(selections: &RedFlagSelections) -> CoreResult<()> {
    if selections.has_misfiled_flags() {
        return Err(CoreError::Validation(
            "red flags must be filed under their own category".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn person(membership_id: MembershipId, y: i32, m: u32, d: u32) -> PersonRecord {
        PersonRecord {
            id: PersonId::new(),
            membership_id,
            display_name: "Subject".into(),
            date_of_birth: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        }
    }

    fn clean_submission() -> IntakeSubmission {
        IntakeSubmission {
            membership_id: MembershipId::new(),
            person_id: PersonId::new(),
            chief_complaint: "ankle pain".into(),
            red_flags: RedFlagSelections::default(),
            none_apply_confirmed: true,
            location_acknowledged: true,
        }
    }

    fn adult_dob() -> NaiveDate {
        NaiveDate::from_ymd_opt(1985, 6, 1).unwrap()
    }

    #[test]
    fn red_flag_codes_match_serialized_form() {
        for flag in RedFlag::ALL {
            let json = serde_json::to_string(&flag).unwrap();
            assert_eq!(json, format!("\"{}\"", flag.code()));
            assert_eq!(flag.code().parse::<RedFlag>().unwrap(), flag);
        }
        assert_eq!("Chest-Pain".parse::<RedFlag>().unwrap(), RedFlag::ChestPain);
        assert!("sore_toe".parse::<RedFlag>().is_err());
    }

    #[test]
    fn clean_intake_proceeds() {
        let decision = evaluate(&clean_submission(), adult_dob(), today(), 18).unwrap();
        match decision {
            TriageDecision::Proceed(payload) => {
                assert_eq!(payload.chief_complaint().as_str(), "ankle pain");
                assert!(!payload.pediatric_screened());
            }
            TriageDecision::Blocked(_) => panic!("expected Proceed"),
        }
    }

    #[test]
    fn any_flag_blocks_even_with_confirmation_checked() {
        let mut submission = clean_submission();
        submission.red_flags.insert(RedFlag::ChestPain);
        let decision = evaluate(&submission, adult_dob(), today(), 18).unwrap();
        match decision {
            TriageDecision::Blocked(blocked) => {
                assert_eq!(blocked.flags(), &[RedFlag::ChestPain]);
            }
            TriageDecision::Proceed(_) => panic!("expected Blocked"),
        }
    }

    #[test]
    fn blocked_is_reported_before_missing_acknowledgements() {
        let mut submission = clean_submission();
        submission.none_apply_confirmed = false;
        submission.location_acknowledged = false;
        submission.chief_complaint.clear();
        submission.red_flags.insert(RedFlag::SelfHarmIntent);
        assert!(evaluate(&submission, adult_dob(), today(), 18)
            .unwrap()
            .is_blocked());
    }

    #[test]
    fn blocked_iff_union_non_empty() {
        for flag in RedFlag::ALL {
            let mut submission = clean_submission();
            submission.red_flags.insert(flag);
            assert!(evaluate(&submission, adult_dob(), today(), 18)
                .unwrap()
                .is_blocked());
            submission.red_flags.remove(flag);
            assert!(!evaluate(&submission, adult_dob(), today(), 18)
                .unwrap()
                .is_blocked());
        }
    }

    #[test]
    fn missing_acknowledgements_are_validation_errors() {
        let mut submission = clean_submission();
        submission.none_apply_confirmed = false;
        assert!(matches!(
            evaluate(&submission, adult_dob(), today(), 18),
            Err(CoreError::Validation(_))
        ));

        let mut submission = clean_submission();
        submission.location_acknowledged = false;
        assert!(matches!(
            evaluate(&submission, adult_dob(), today(), 18),
            Err(CoreError::Validation(_))
        ));

        let mut submission = clean_submission();
        submission.chief_complaint = "  ".into();
        assert!(matches!(
            evaluate(&submission, adult_dob(), today(), 18),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn selecting_a_flag_after_confirming_reopens_the_block() {
        let membership = MembershipId::new();
        let mut form = TriageForm::new(membership, 18);
        form.select_subject(&person(membership, 1985, 6, 1), today())
            .unwrap();
        form.set_chief_complaint("ankle pain");
        form.acknowledge_location(true);
        form.confirm_none_apply().unwrap();
        assert!(!form.evaluate(today()).unwrap().is_blocked());

        form.select_flag(RedFlag::DifficultyBreathing).unwrap();
        assert!(form.is_blocked());
        assert!(!form.submission().unwrap().none_apply_confirmed);
        assert!(form.evaluate(today()).unwrap().is_blocked());
    }

    #[test]
    fn chest_pain_cannot_be_confirmed_away() {
        let membership = MembershipId::new();
        let mut form = TriageForm::new(membership, 18);
        form.select_subject(&person(membership, 1970, 1, 1), today())
            .unwrap();
        form.set_chief_complaint("tightness");
        form.acknowledge_location(true);
        form.select_flag(RedFlag::ChestPain).unwrap();

        assert!(form.confirm_none_apply().is_err());
        form.withdraw_none_apply();
        assert!(form.confirm_none_apply().is_err());
        assert!(form.evaluate(today()).unwrap().is_blocked());
    }

    #[test]
    fn pediatric_flags_track_subject_age() {
        let membership = MembershipId::new();
        let child = person(membership, 2020, 3, 3);
        let adult = person(membership, 1980, 3, 3);
        let mut form = TriageForm::new(membership, 18);

        form.select_subject(&child, today()).unwrap();
        assert!(form.pediatric_offered());
        assert!(form.offered_flags().contains(&RedFlag::InfantFever));
        form.select_flag(RedFlag::InfantFever).unwrap();
        assert!(form.is_blocked());

        form.select_subject(&adult, today()).unwrap();
        assert!(!form.pediatric_offered());
        assert!(!form.offered_flags().contains(&RedFlag::InfantFever));
        assert!(!form.selections().contains(RedFlag::InfantFever));
        assert!(form.select_flag(RedFlag::InfantFever).is_err());
    }

    #[test]
    fn pediatric_visibility_is_evaluated_at_evaluation_date() {
        let dob = NaiveDate::from_ymd_opt(2008, 10, 20).unwrap();
        assert!(pediatric_flags_apply(dob, today(), 18));
        assert!(!pediatric_flags_apply(dob, today().succ_opt().unwrap(), 18));
    }

    #[test]
    fn subject_outside_membership_is_rejected() {
        let mut form = TriageForm::new(MembershipId::new(), 18);
        let stranger = person(MembershipId::new(), 1990, 1, 1);
        assert!(form.select_subject(&stranger, today()).is_err());
    }

    #[test]
    fn misfiled_flags_are_detected() {
        let mut selections = RedFlagSelections::default();
        selections.general.insert(RedFlag::InfantFever);
        assert!(check_selection_shape(&selections).is_err());
        assert!(check_selection_shape(&RedFlagSelections::default()).is_ok());
    }
}
