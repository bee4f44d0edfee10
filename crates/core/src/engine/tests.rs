use std::time::Duration;

use tokio::time::{sleep, timeout};
use triage_model::{
    EscalationDecision, Intent, IntentClassification, KbSearchResult,
    KnowledgeBase,
};
use triage_test_services::{
    Preset, ScriptedAdvisor, ScriptedClassifier, ScriptedKnowledgeBase,
};

use super::state::{
    EscalationAdvised, IntentClassified, KnowledgeBaseSearched,
    TaskEndedMessage,
};
use crate::conversation::{ConversationView, Message, Mode, Sender};
use crate::{Engine, EngineBuilder};

const TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct Fixture {
    searcher: ScriptedKnowledgeBase,
    classifier: ScriptedClassifier,
    advisor: ScriptedAdvisor,
}

impl Fixture {
    fn build(&self) -> Engine {
        EngineBuilder::with_services(
            self.searcher.clone(),
            self.classifier.clone(),
            self.advisor.clone(),
        )
        .build()
    }
}

async fn wait_for_view<F>(engine: &Engine, mut f: F) -> ConversationView
where
    F: FnMut(&ConversationView) -> bool,
{
    let mut rx = engine.subscribe();
    timeout(TIMEOUT, rx.wait_for(|view| f(view)))
        .await
        .unwrap()
        .unwrap()
        .clone()
}

/// Waits until the engine has published something newer than `revision`
/// and has nothing running in the background.
async fn wait_settled(engine: &Engine, revision: u64) -> ConversationView {
    wait_for_view(engine, |view| view.revision > revision && view.is_settled())
        .await
}

fn texts(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(Message::text).collect()
}

fn password_hit() -> KbSearchResult {
    let kb = KnowledgeBase::sample();
    let entry = kb.lookup("How do I reset my password?").unwrap();
    KbSearchResult::hit(entry.answer.clone(), entry.question.clone())
}

#[tokio::test]
async fn test_greeting() {
    let engine = Fixture::default().build();
    let view = engine.view();
    assert_eq!(view.mode, Mode::Idle);
    assert!(view.input_enabled);
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].sender(), Sender::Agent);
    assert_eq!(
        view.messages[0].text(),
        "Hello! I'm your AI Customer Service Agent. How can I help you today?"
    );

    let engine = EngineBuilder::with_services(
        ScriptedKnowledgeBase::default(),
        ScriptedClassifier::default(),
        ScriptedAdvisor::default(),
    )
    .with_greeting("Hi there")
    .build();
    assert_eq!(engine.view().messages[0].text(), "Hi there");
}

#[tokio::test]
async fn test_knowledge_base_hit() {
    let mut fixture = Fixture::default();
    fixture
        .searcher
        .add_reply("How do I reset my password?", password_hit());
    let engine = fixture.build();

    engine.submit("How do I reset my password?").unwrap();
    let view = wait_settled(&engine, 0).await;

    let new = view.messages_since(1);
    assert_eq!(new.len(), 3);
    assert_eq!(new[0].sender(), Sender::User);
    assert_eq!(new[0].text(), "How do I reset my password?");
    assert_eq!(new[1].sender(), Sender::System);
    assert!(new[1].text().contains("(Source: KB)"));

    let reply = &new[2];
    assert_eq!(reply.sender(), Sender::Agent);
    assert_eq!(reply.intent(), Some(Intent::TechnicalSupport));
    assert_eq!(reply.topic(), Some("How do I reset my password?"));
    assert!(reply.text().contains("Forgot Password"));
    assert!(reply.text().ends_with(" Does this resolve your issue?"));

    assert_eq!(view.mode, Mode::AwaitingConfirmationResolved);
    assert_eq!(view.last_agent_intent, Some(Intent::TechnicalSupport));
    assert!(view.show_resolution_actions);
    assert!(!view.input_enabled);
    assert_eq!(fixture.classifier.calls(), 0);
    assert_eq!(fixture.advisor.calls(), 1);
}

#[tokio::test]
async fn test_classified_feature_request() {
    let mut fixture = Fixture::default();
    fixture.classifier.add_reply(
        "Can you add dark mode?",
        IntentClassification::new(Intent::ProductFeatureRequest)
            .with_topic("dark mode"),
    );
    let engine = fixture.build();

    engine.submit("Can you add dark mode?").unwrap();
    let view = wait_settled(&engine, 0).await;

    assert_eq!(
        texts(view.messages_since(1)),
        [
            "Can you add dark mode?",
            "No direct answer in Knowledge Base. Proceeding with AI \
             classification...",
            "Query classified by AI as: Product Feature Request (Topic: dark \
             mode)",
            "Thank you for your suggestion! We've logged your feature request \
             for \"dark mode\" for our product team to review. Does this \
             resolve your issue?",
        ]
    );
    assert_eq!(view.mode, Mode::AwaitingConfirmationResolved);
    assert_eq!(fixture.searcher.calls(), 1);
    assert_eq!(fixture.classifier.calls(), 1);
}

#[tokio::test]
async fn test_missing_topic_falls_back_to_query() {
    let mut fixture = Fixture::default();
    fixture.classifier.set_fallback(Preset::Reply(IntentClassification::new(
        Intent::SalesLead,
    )));
    let engine = fixture.build();

    engine.submit("How much is the enterprise plan?").unwrap();
    let view = wait_settled(&engine, 0).await;

    let reply = view.messages.last().unwrap();
    assert_eq!(reply.topic(), Some("How much is the enterprise plan?..."));
    assert!(reply.text().contains("Our sales team will be in touch soon"));
}

#[tokio::test]
async fn test_classifier_failure() {
    let mut fixture = Fixture::default();
    fixture.classifier.set_fallback(Preset::failure("Network error"));
    let engine = fixture.build();

    engine.submit("My printer is on fire").unwrap();
    let view = wait_settled(&engine, 0).await;

    // The knowledge base miss stays in the log.
    assert_eq!(
        texts(view.messages_since(1)),
        [
            "My printer is on fire",
            "No direct answer in Knowledge Base. Proceeding with AI \
             classification...",
            "An error occurred while processing your request. Details: \
             Network error",
            "The agent has finished processing your query due to an error. \
             Start a new query to continue.",
        ]
    );
    let errors = view
        .messages
        .iter()
        .filter(|msg| msg.text().starts_with("An error occurred"))
        .count();
    assert_eq!(errors, 1);

    assert_eq!(view.mode, Mode::Inactive);
    assert!(!view.is_conversation_active);
    assert!(!view.awaiting_resolution_confirmation);
    assert!(view.show_start_new_query);
    assert!(!view.input_enabled);
    assert_eq!(fixture.advisor.calls(), 0);

    // Only a new query gets the conversation going again.
    engine.submit("Hello?").unwrap();
    engine.start_new_query().unwrap();
    let view = wait_settled(&engine, view.revision).await;
    assert_eq!(
        texts(view.messages_since(5)),
        ["Please ask your next question."]
    );
    assert_eq!(view.mode, Mode::Idle);
}

#[tokio::test]
async fn test_search_failure() {
    let mut fixture = Fixture::default();
    fixture.searcher.set_fallback(Preset::failure("Index offline"));
    let engine = fixture.build();

    engine.submit("Where is my invoice?").unwrap();
    let view = wait_settled(&engine, 0).await;

    assert_eq!(
        view.messages_since(2)[0].text(),
        "An error occurred while processing your request. Details: Index \
         offline"
    );
    assert_eq!(view.mode, Mode::Inactive);
    assert_eq!(fixture.classifier.calls(), 0);
}

#[tokio::test]
async fn test_blank_query_is_ignored() {
    let fixture = Fixture::default();
    let engine = fixture.build();

    engine.submit("").unwrap();
    engine.submit("   \n").unwrap();
    sleep(Duration::from_millis(50)).await;

    let view = engine.view();
    assert_eq!(view.revision, 0);
    assert_eq!(view.messages.len(), 1);
    assert_eq!(fixture.searcher.calls(), 0);
}

#[tokio::test]
async fn test_user_message_is_shown_while_processing() {
    let mut fixture = Fixture::default();
    fixture.searcher.set_delay(Duration::from_millis(300));
    let engine = fixture.build();

    engine.submit("Is anyone there?").unwrap();
    let view = wait_for_view(&engine, |view| view.revision > 0).await;
    assert_eq!(view.mode, Mode::Processing);
    assert!(view.is_loading);
    assert!(!view.input_enabled);
    assert_eq!(texts(view.messages_since(1)), ["Is anyone there?"]);

    // Rejected while the first query is being processed.
    engine.submit("Hello?").unwrap();

    let view = wait_settled(&engine, view.revision).await;
    let users = view
        .messages
        .iter()
        .filter(|msg| msg.sender() == Sender::User)
        .count();
    assert_eq!(users, 1);
    assert_eq!(view.mode, Mode::AwaitingConfirmationUnknown);
    assert_eq!(fixture.searcher.calls(), 1);
}

#[tokio::test]
async fn test_new_query_abandons_processing() {
    let mut fixture = Fixture::default();
    fixture
        .searcher
        .add_reply("How do I reset my password?", password_hit());
    fixture.searcher.set_delay(Duration::from_millis(300));
    let engine = fixture.build();

    engine.submit("How do I reset my password?").unwrap();
    let view = wait_for_view(&engine, |view| view.mode == Mode::Processing).await;

    engine.start_new_query().unwrap();
    let view = wait_settled(&engine, view.revision).await;
    assert_eq!(view.mode, Mode::Idle);
    assert!(view.input_enabled);
    assert!(!view.is_loading);
    assert_eq!(
        texts(view.messages_since(1)),
        ["How do I reset my password?", "Please ask your next question."]
    );

    // The abandoned search never reaches the conversation.
    sleep(Duration::from_millis(400)).await;
    let later = engine.view();
    assert_eq!(later.revision, view.revision);
    assert_eq!(later.messages.len(), 3);
    assert_eq!(later.mode, Mode::Idle);
    assert_eq!(fixture.searcher.calls(), 1);
    assert_eq!(fixture.classifier.calls(), 0);
    assert_eq!(fixture.advisor.calls(), 0);

    // The next query is resolved normally.
    engine.submit("How do I reset my password?").unwrap();
    let view = wait_settled(&engine, later.revision).await;
    assert_eq!(view.mode, Mode::AwaitingConfirmationResolved);
    assert!(view.messages.last().unwrap().text().contains("Forgot Password"));
    assert_eq!(fixture.searcher.calls(), 2);
}

#[tokio::test]
async fn test_new_query_drops_deferred_query() {
    let mut fixture = Fixture::default();
    fixture
        .searcher
        .add_reply("How do I reset my password?", password_hit());
    fixture.advisor.set_delay(Duration::from_millis(300));
    let engine = fixture.build();

    engine.submit("How do I reset my password?").unwrap();
    wait_for_view(&engine, |view| {
        view.mode == Mode::AwaitingConfirmationResolved
    })
    .await;
    engine.confirm_not_resolved().unwrap();
    engine.submit("It still doesn't work").unwrap();
    let view = wait_for_view(&engine, |view| view.mode == Mode::Processing).await;
    assert!(view.escalation_pending);

    engine.start_new_query().unwrap();
    let view = wait_settled(&engine, view.revision).await;
    assert_eq!(view.mode, Mode::Idle);
    assert_eq!(
        view.messages.last().unwrap().text(),
        "Please ask your next question."
    );
    assert_eq!(fixture.searcher.calls(), 1);
    assert_eq!(fixture.advisor.calls(), 1);
}

#[tokio::test]
async fn test_stale_results_are_discarded() {
    let mut fixture = Fixture::default();
    fixture.searcher.set_delay(Duration::from_millis(300));
    let engine = fixture.build();

    engine.submit("Is anyone there?").unwrap();
    let view = wait_for_view(&engine, |view| view.mode == Mode::Processing).await;

    // Task ids start at 1, so none of these belongs to the running pipeline.
    let stale = 999;
    let handle = &engine.handle;
    handle
        .send(KnowledgeBaseSearched {
            task_id: stale,
            result: Ok(Some(password_hit())),
        })
        .unwrap();
    handle
        .send(IntentClassified {
            task_id: stale,
            result: Ok(Some(IntentClassification::new(Intent::SalesLead))),
        })
        .unwrap();
    handle
        .send(EscalationAdvised {
            task_id: stale,
            result: Ok(Some(EscalationDecision::escalate(None))),
        })
        .unwrap();
    handle
        .send(TaskEndedMessage {
            task_id: stale,
            panicked: true,
        })
        .unwrap();

    let view = wait_settled(&engine, view.revision).await;
    let new = view.messages_since(1);
    assert_eq!(new.len(), 4);
    assert_eq!(new[0].text(), "Is anyone there?");
    assert!(
        new.iter()
            .all(|msg| msg.intent() != Some(Intent::SalesLead)
                && !msg.text().contains("Source: KB")
                && !msg.text().contains("flagged for escalation"))
    );
    assert_eq!(view.mode, Mode::AwaitingConfirmationUnknown);
    assert_eq!(fixture.searcher.calls(), 1);
    assert_eq!(fixture.classifier.calls(), 1);
}

#[tokio::test]
async fn test_panicking_collaborator_fails_the_query() {
    let mut fixture = Fixture::default();
    fixture
        .classifier
        .set_fallback(Preset::Panic("classifier crashed".to_owned()));
    let engine = fixture.build();

    engine.submit("My printer is on fire").unwrap();
    let view = wait_settled(&engine, 0).await;

    let errors: Vec<_> = view
        .messages
        .iter()
        .filter(|msg| msg.text().starts_with("An error occurred"))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].text(),
        "An error occurred while processing your request. Details: the \
         request ended unexpectedly"
    );
    assert_eq!(view.mode, Mode::Inactive);
    assert!(view.show_start_new_query);
    assert_eq!(fixture.advisor.calls(), 0);

    engine.start_new_query().unwrap();
    let view = wait_settled(&engine, view.revision).await;
    assert_eq!(view.mode, Mode::Idle);
}

#[tokio::test]
async fn test_failed_escalation_check_releases_deferred_query() {
    for preset in [
        Preset::failure("Advisor timed out"),
        Preset::Panic("advisor crashed".to_owned()),
    ] {
        let mut fixture = Fixture::default();
        fixture
            .searcher
            .add_reply("How do I reset my password?", password_hit());
        fixture.advisor.set_fallback(preset);
        fixture.advisor.set_delay(Duration::from_millis(200));
        let engine = fixture.build();

        engine.submit("How do I reset my password?").unwrap();
        wait_for_view(&engine, |view| {
            view.mode == Mode::AwaitingConfirmationResolved
        })
        .await;
        engine.confirm_not_resolved().unwrap();
        engine.submit("It still doesn't work").unwrap();
        let view =
            wait_for_view(&engine, |view| view.mode == Mode::Processing).await;
        assert!(view.escalation_pending);

        let view = wait_settled(&engine, view.revision).await;
        assert_eq!(view.mode, Mode::AwaitingConfirmationUnknown);
        assert!(
            view.messages
                .iter()
                .all(|msg| !msg.text().contains("flagged for escalation"))
        );
        assert_eq!(fixture.searcher.calls(), 2);
        assert_eq!(fixture.classifier.calls(), 1);
    }
}

#[tokio::test]
async fn test_unclassified_query_and_rephrase() {
    let fixture = Fixture::default();
    let engine = fixture.build();

    engine.submit("asdf qwer").unwrap();
    let view = wait_settled(&engine, 0).await;

    let notice = &view.messages_since(3)[0];
    assert!(notice.text().starts_with("Error: Could not classify"));
    let reply = view.messages.last().unwrap();
    assert_eq!(reply.intent(), Some(Intent::Unknown));
    assert_eq!(
        reply.text(),
        "I'm having trouble understanding your request. Could you please try \
         rephrasing it?"
    );
    assert_eq!(view.mode, Mode::AwaitingConfirmationUnknown);
    assert!(view.show_rephrase);
    assert!(!view.show_resolution_actions);

    // Resolution verdicts are not offered for an unknown intent.
    let count = view.messages.len();
    engine.confirm_resolved().unwrap();
    engine.confirm_not_resolved().unwrap();
    engine.rephrase_after_unknown().unwrap();
    let view = wait_settled(&engine, view.revision).await;

    assert_eq!(
        texts(view.messages_since(count)),
        [
            "Okay, please rephrase your previous question or provide more \
             details."
        ]
    );
    assert_eq!(view.mode, Mode::Idle);
    assert!(!view.awaiting_resolution_confirmation);
    assert_eq!(view.last_agent_intent, None);
}

#[tokio::test]
async fn test_confirm_resolved() {
    let mut fixture = Fixture::default();
    fixture
        .searcher
        .add_reply("How do I reset my password?", password_hit());
    let engine = fixture.build();

    engine.submit("How do I reset my password?").unwrap();
    let view = wait_settled(&engine, 0).await;
    let count = view.messages.len();

    engine.rephrase_after_unknown().unwrap();
    engine.confirm_resolved().unwrap();
    let view = wait_settled(&engine, view.revision).await;

    let new = view.messages_since(count);
    assert_eq!(
        texts(new),
        ["Great! I'm glad I could help.", "Please ask your next question."]
    );
    assert_eq!(new[0].sender(), Sender::Agent);
    assert_eq!(new[0].intent(), Some(Intent::TechnicalSupport));
    assert_eq!(new[1].sender(), Sender::System);
    assert_eq!(view.mode, Mode::Idle);
    assert_eq!(view.last_agent_intent, None);
    assert!(view.input_enabled);
}

#[tokio::test]
async fn test_confirm_not_resolved() {
    let mut fixture = Fixture::default();
    fixture.classifier.set_fallback(Preset::Reply(
        IntentClassification::new(Intent::SalesLead).with_topic("pricing"),
    ));
    let engine = fixture.build();

    engine.submit("What does it cost?").unwrap();
    let view = wait_settled(&engine, 0).await;
    let count = view.messages.len();

    engine.confirm_not_resolved().unwrap();
    let view = wait_settled(&engine, view.revision).await;

    let new = view.messages_since(count);
    assert_eq!(
        texts(new),
        [
            "I understand. Could you please rephrase your question or provide \
             more details about the issue?"
        ]
    );
    assert_eq!(new[0].intent(), Some(Intent::SalesLead));
    assert_eq!(view.mode, Mode::Idle);
    assert!(!view.awaiting_resolution_confirmation);
}

#[tokio::test]
async fn test_configuration_error_is_terminal() {
    let banner = "API Key is not configured or is using a placeholder.";
    let engine = EngineBuilder::with_configuration_error(banner).build();

    let view = engine.view();
    assert_eq!(view.mode, Mode::ConfigurationError);
    assert_eq!(view.configuration_error.as_deref(), Some(banner));
    assert_eq!(texts(&view.messages), [banner]);
    assert_eq!(view.messages[0].sender(), Sender::System);
    assert!(!view.input_enabled);

    engine.submit("Hello").unwrap();
    engine.start_new_query().unwrap();
    engine.confirm_resolved().unwrap();
    engine.confirm_not_resolved().unwrap();
    engine.rephrase_after_unknown().unwrap();
    sleep(Duration::from_millis(50)).await;

    let view = engine.view();
    assert_eq!(view.revision, 0);
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.mode, Mode::ConfigurationError);
}

#[tokio::test]
async fn test_escalation_notice() {
    let mut fixture = Fixture::default();
    fixture
        .searcher
        .add_reply("How do I reset my password?", password_hit());
    fixture.advisor.add_reply(
        "How do I reset my password?",
        EscalationDecision::escalate(Some(
            "Customer is locked out repeatedly".to_owned(),
        )),
    );
    let engine = fixture.build();

    engine.submit("How do I reset my password?").unwrap();
    let view = wait_settled(&engine, 0).await;

    let notice = view.messages.last().unwrap();
    assert_eq!(notice.sender(), Sender::System);
    assert_eq!(
        notice.text(),
        "This issue has been flagged for escalation to our human Technical \
         Support team. Reason: Customer is locked out repeatedly"
    );
    assert_eq!(notice.intent(), Some(Intent::TechnicalSupport));
    // The escalation leaves the mode alone.
    assert_eq!(view.mode, Mode::AwaitingConfirmationResolved);
}

#[tokio::test]
async fn test_escalation_failure_is_ignored() {
    let mut fixture = Fixture::default();
    fixture.classifier.set_fallback(Preset::Reply(
        IntentClassification::new(Intent::TechnicalSupport).with_topic("crash"),
    ));
    fixture.advisor.set_fallback(Preset::failure("Advisor timed out"));
    let engine = fixture.build();

    engine.submit("The app crashes on start").unwrap();
    let view = wait_settled(&engine, 0).await;

    assert!(
        view.messages
            .iter()
            .all(|msg| !msg.text().contains("Advisor timed out"))
    );
    assert!(view.messages.last().unwrap().text().starts_with("Thanks"));
    assert_eq!(view.mode, Mode::AwaitingConfirmationResolved);
    assert_eq!(fixture.advisor.calls(), 1);
}

#[tokio::test]
async fn test_query_waits_for_escalation_check() {
    let mut fixture = Fixture::default();
    fixture
        .searcher
        .add_reply("How do I reset my password?", password_hit());
    fixture.advisor.set_delay(Duration::from_millis(300));
    let engine = fixture.build();

    engine.submit("How do I reset my password?").unwrap();
    let view = wait_for_view(&engine, |view| {
        view.mode == Mode::AwaitingConfirmationResolved
    })
    .await;
    assert!(view.escalation_pending);

    engine.confirm_not_resolved().unwrap();
    engine.submit("It still doesn't work").unwrap();
    let view = wait_for_view(&engine, |view| {
        view.messages
            .last()
            .is_some_and(|msg| msg.text() == "It still doesn't work")
    })
    .await;
    assert_eq!(view.mode, Mode::Processing);
    assert!(view.escalation_pending);
    assert_eq!(fixture.searcher.calls(), 1);

    let view = wait_settled(&engine, view.revision).await;
    assert_eq!(fixture.searcher.calls(), 2);
    assert_eq!(fixture.advisor.calls(), 2);
    assert_eq!(view.mode, Mode::AwaitingConfirmationUnknown);
}

#[tokio::test]
async fn test_shutdown() {
    let engine = Fixture::default().build();
    let mut rx = engine.subscribe();
    engine.shutdown();

    // The view sender is dropped with the engine state.
    let changed = timeout(TIMEOUT, rx.changed()).await.unwrap();
    assert!(changed.is_err());
}
