// tests/engine_tests.rs

use std::sync::Arc;

use survey_backend::{
    engine::{AccessKeyService, EngineError, ResponseWizard, SubmissionPipeline, SurveyService, WizardStep},
    models::{
        question::CreateQuestionRequest,
        survey::{CreateSurveyRequest, SurveyDetail},
    },
    store::{MemoryStore, SurveyStore},
};
use uuid::Uuid;

fn survey_request(questions: usize) -> CreateSurveyRequest {
    CreateSurveyRequest {
        title: format!("Survey {}", Uuid::new_v4()),
        description: String::new(),
        point_multiplier: None,
        questions: (0..questions)
            .map(|i| CreateQuestionRequest {
                rating: Some(format!("Rating {}", i)),
                weighting: Some(format!("Weight {}", i)),
            })
            .collect(),
    }
}

async fn seeded(store: Arc<dyn SurveyStore>, questions: usize) -> SurveyDetail {
    SurveyService::new(store)
        .create(survey_request(questions))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemption_has_one_winner() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let survey = seeded(store.clone(), 1).await;
    let keys = AccessKeyService::new(store.clone());
    let key_id = keys.generate_key(survey.survey.id).await.unwrap().id;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let keys = keys.clone();
        handles.push(tokio::spawn(async move { keys.redeem(key_id).await }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(EngineError::AlreadyUsed) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(winners, 1);

    let stored = store.find_access_key(key_id).await.unwrap().unwrap();
    assert!(stored.is_used);
}

#[tokio::test]
async fn redeeming_unknown_key_is_not_found() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let keys = AccessKeyService::new(store);
    assert!(matches!(
        keys.redeem(Uuid::new_v4()).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn activation_keeps_a_single_active_survey() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let surveys = SurveyService::new(store.clone());
    let a = seeded(store.clone(), 1).await.survey.id;
    let b = seeded(store.clone(), 1).await.survey.id;

    surveys.activate(a).await.unwrap();
    surveys.activate(b).await.unwrap();
    // Activating the active survey again changes nothing.
    surveys.activate(b).await.unwrap();

    let list = surveys.list(None).await.unwrap();
    assert_eq!(list.iter().filter(|s| s.is_active).count(), 1);
    assert_eq!(surveys.active().await.unwrap().survey.id, b);

    assert!(matches!(
        surveys.activate(Uuid::new_v4()).await,
        Err(EngineError::NotFound(_))
    ));
    // The failed activation did not switch the active survey off.
    assert_eq!(surveys.active().await.unwrap().survey.id, b);

    surveys.deactivate(b).await.unwrap();
    assert!(matches!(surveys.active().await, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn batch_with_already_invited_address_inserts_nothing() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let survey = seeded(store.clone(), 1).await.survey.id;
    let keys = AccessKeyService::new(store.clone());

    let first = keys
        .issue_keys(survey, &["a@x.com".to_string()])
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert!(!first[0].is_used && !first[0].is_sent);

    let second = keys
        .issue_keys(survey, &["b@x.com".to_string(), "a@x.com".to_string()])
        .await;
    assert!(matches!(second, Err(EngineError::AlreadyInvited)));
    assert_eq!(store.list_access_keys(survey).await.unwrap().len(), 1);
}

#[tokio::test]
async fn address_case_variant_counts_as_already_invited() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let survey = seeded(store.clone(), 1).await.survey.id;
    let keys = AccessKeyService::new(store.clone());

    let first = keys
        .issue_keys(survey, &["a@x.com".to_string()])
        .await
        .unwrap();
    assert_eq!(first[0].email.as_deref(), Some("a@x.com"));

    let second = keys.issue_keys(survey, &[" A@X.com ".to_string()]).await;
    assert!(matches!(second, Err(EngineError::AlreadyInvited)));
    assert_eq!(store.list_access_keys(survey).await.unwrap().len(), 1);
}

#[tokio::test]
async fn same_address_may_repeat_without_email_uniqueness() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::without_email_uniqueness());
    let survey = seeded(store.clone(), 1).await.survey.id;
    let keys = AccessKeyService::new(store.clone());

    let issued = keys
        .issue_keys(survey, &["a@x.com".to_string(), "a@x.com".to_string()])
        .await
        .unwrap();
    assert_eq!(issued.len(), 2);
    assert_ne!(issued[0].key, issued[1].key);
}

#[tokio::test]
async fn submission_scenario_redeems_key_and_resets_session() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let survey = seeded(store.clone(), 2).await;
    let (q1, q2) = (survey.questions[0].id, survey.questions[1].id);
    let key = AccessKeyService::new(store.clone())
        .generate_key(survey.survey.id)
        .await
        .unwrap();

    let pipeline = SubmissionPipeline::new(store.clone());
    let mut wizard = pipeline.open_session(&key.key).await.unwrap();
    assert_eq!(wizard.current_step(), WizardStep::Intro);

    wizard.next_step();
    wizard.set_weight(q1, 10.0).unwrap();
    wizard.set_weight(q2, 10.0).unwrap();
    wizard.next_step();
    wizard.set_rating(q1, 3.0).unwrap();
    wizard.set_rating(q2, 5.0).unwrap();
    wizard.next_step();

    let receipt = pipeline.submit(&mut wizard).await.unwrap();
    assert!(receipt.is_submitted);
    assert!((receipt.total_points - 102.564).abs() < 0.001);

    // Session is back to a blank step 1.
    assert_eq!(wizard.current_step(), WizardStep::Intro);
    assert!(wizard.weights().is_empty());
    assert_eq!(wizard.survey_id(), None);

    assert!(store.find_access_key(key.id).await.unwrap().unwrap().is_used);
    let responses = store.list_responses(survey.survey.id).await.unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].answers.weights[&q1].text, "Weight 0");

    // The token no longer opens a session.
    assert!(matches!(
        pipeline.open_session(&key.key).await,
        Err(EngineError::AlreadyUsed)
    ));
}

#[tokio::test]
async fn out_of_budget_submission_keeps_session() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let survey = seeded(store.clone(), 2).await;
    let (q1, q2) = (survey.questions[0].id, survey.questions[1].id);
    let key = AccessKeyService::new(store.clone())
        .generate_key(survey.survey.id)
        .await
        .unwrap();

    let pipeline = SubmissionPipeline::new(store.clone());
    let mut wizard = pipeline.open_session(&key.key).await.unwrap();
    wizard.set_weight(q1, 30.0).unwrap();
    wizard.set_weight(q2, 30.0).unwrap();
    wizard.set_rating(q1, 1.0).unwrap();
    wizard.set_rating(q2, 1.0).unwrap();

    assert!(matches!(
        pipeline.submit(&mut wizard).await,
        Err(EngineError::PointBudget { .. })
    ));
    // Answers stay so the respondent can fix them.
    assert_eq!(wizard.weights().len(), 2);
    assert!(!store.find_access_key(key.id).await.unwrap().unwrap().is_used);
    assert!(store.list_responses(survey.survey.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn session_without_identity_is_refused() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let pipeline = SubmissionPipeline::new(store);
    let mut wizard = ResponseWizard::new();

    assert!(matches!(
        pipeline.submit(&mut wizard).await,
        Err(EngineError::MissingIdentity)
    ));
}

#[tokio::test]
async fn losing_a_redemption_race_leaves_the_response_and_resets() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let survey = seeded(store.clone(), 1).await;
    let q1 = survey.questions[0].id;
    let keys = AccessKeyService::new(store.clone());
    let key = keys.generate_key(survey.survey.id).await.unwrap();

    let pipeline = SubmissionPipeline::new(store.clone());
    let mut wizard = pipeline.open_session(&key.key).await.unwrap();
    // 20 * 200/39 is about 102.56.
    wizard.set_weight(q1, 20.0).unwrap();
    wizard.set_rating(q1, 2.0).unwrap();

    // Someone else redeems the key between opening and submitting.
    keys.redeem(key.id).await.unwrap();

    assert!(matches!(
        pipeline.submit(&mut wizard).await,
        Err(EngineError::AlreadyUsed)
    ));
    assert_eq!(wizard.current_step(), WizardStep::Intro);
    assert_eq!(wizard.access_key_id(), None);
    // The response written before redemption is kept.
    assert_eq!(store.list_responses(survey.survey.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_a_survey_removes_its_keys() {
    let store: Arc<dyn SurveyStore> = Arc::new(MemoryStore::new());
    let survey = seeded(store.clone(), 1).await.survey.id;
    let keys = AccessKeyService::new(store.clone());
    let key = keys.generate_key(survey).await.unwrap();

    SurveyService::new(store.clone()).delete(survey).await.unwrap();

    assert!(store.find_access_key(key.id).await.unwrap().is_none());
    assert!(!keys.revoke(key.id).await.unwrap());
}
