// src/engine/wizard.rs

//! Per-respondent wizard session.
//!
//! The session is owned by exactly one respondent context and mutated only
//! through the methods below. Steps only move forward; [`ResponseWizard::reset`]
//! is the only way back to the start.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    engine::{EngineError, points},
    models::{question::Question, survey::SurveyDetail},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum WizardStep {
    /// Respondent bound to a survey and an access key.
    #[default]
    Intro = 1,
    Weighting = 2,
    Rating = 3,
    /// Review, then submit.
    Review = 4,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    fn next(self) -> Self {
        match self {
            WizardStep::Intro => WizardStep::Weighting,
            WizardStep::Weighting => WizardStep::Rating,
            WizardStep::Rating | WizardStep::Review => WizardStep::Review,
        }
    }
}

impl From<WizardStep> for u8 {
    fn from(step: WizardStep) -> Self {
        step.number()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseWizard {
    current_step: WizardStep,
    survey_id: Option<Uuid>,
    survey_title: String,
    point_multiplier: f64,
    questions: Vec<Question>,
    access_key_id: Option<Uuid>,
    weights: BTreeMap<Uuid, f64>,
    ratings: BTreeMap<Uuid, f64>,
    total_points: f64,
    is_submitted: bool,
}

impl ResponseWizard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session already bound to a survey and an access key.
    pub fn start(survey: SurveyDetail, access_key_id: Uuid) -> Self {
        let mut wizard = Self::new();
        wizard.load_survey(survey);
        wizard.bind_access_key(access_key_id);
        wizard
    }

    /// Binds the session to a survey and its questions. Previous answers are dropped.
    pub fn load_survey(&mut self, survey: SurveyDetail) {
        self.survey_id = Some(survey.survey.id);
        self.point_multiplier = survey.survey.effective_multiplier();
        self.survey_title = survey.survey.title;
        self.questions = survey.questions;
        self.weights.clear();
        self.ratings.clear();
        self.total_points = 0.0;
    }

    pub fn bind_access_key(&mut self, access_key_id: Uuid) {
        self.access_key_id = Some(access_key_id);
    }

    /// Records a weight and recomputes the point total.
    pub fn set_weight(&mut self, question_id: Uuid, weight: f64) -> Result<(), EngineError> {
        self.check_answer(question_id, weight)?;
        self.weights.insert(question_id, weight);
        self.recalculate_total();
        Ok(())
    }

    pub fn set_rating(&mut self, question_id: Uuid, rating: f64) -> Result<(), EngineError> {
        self.check_answer(question_id, rating)?;
        self.ratings.insert(question_id, rating);
        Ok(())
    }

    /// Moves one step forward. A no-op on the last step.
    pub fn next_step(&mut self) {
        self.current_step = self.current_step.next();
    }

    /// Back to step 1 with nothing bound and nothing answered.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn current_step(&self) -> WizardStep {
        self.current_step
    }

    pub fn survey_id(&self) -> Option<Uuid> {
        self.survey_id
    }

    pub fn survey_title(&self) -> &str {
        &self.survey_title
    }

    pub fn access_key_id(&self) -> Option<Uuid> {
        self.access_key_id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn weights(&self) -> &BTreeMap<Uuid, f64> {
        &self.weights
    }

    pub fn ratings(&self) -> &BTreeMap<Uuid, f64> {
        &self.ratings
    }

    pub fn point_multiplier(&self) -> f64 {
        self.point_multiplier
    }

    pub fn total_points(&self) -> f64 {
        self.total_points
    }

    pub fn is_valid_points(&self) -> bool {
        points::is_valid_points(self.total_points)
    }

    pub fn is_submitted(&self) -> bool {
        self.is_submitted
    }

    pub fn are_all_weights_set(&self) -> bool {
        self.missing_weights() == 0
    }

    pub fn are_all_ratings_set(&self) -> bool {
        self.missing_ratings() == 0
    }

    pub fn missing_weights(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| !self.weights.contains_key(&q.id))
            .count()
    }

    pub fn missing_ratings(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| !self.ratings.contains_key(&q.id))
            .count()
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.is_submitted = true;
    }

    fn check_answer(&self, question_id: Uuid, value: f64) -> Result<(), EngineError> {
        if !value.is_finite() {
            return Err(EngineError::Validation(format!(
                "answer for question {} is not a number",
                question_id
            )));
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(EngineError::NotFound(format!("question {}", question_id)));
        }
        Ok(())
    }

    fn recalculate_total(&mut self) {
        self.total_points = points::total_points(self.weights.values(), self.point_multiplier);
    }
}
