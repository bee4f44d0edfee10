use std::fmt::Display;

use triage_actor::{Actor, Message, State};
use triage_model::{
    EscalationDecision, EscalationRequest, Intent, IntentClassification,
    KbSearchResult,
};

use super::{EngineState, PendingEscalation, PipelineRun};
use crate::conversation::{
    ConversationView, Message as LogMessage, Mode, Sender,
};
use crate::resolution::{self, KNOWLEDGE_BASE_MISS, ResolutionOutcome};
use crate::services::ServiceResult;

const NEXT_QUESTION: &str = "Please ask your next question.";
const RESOLVED_ACK: &str = "Great! I'm glad I could help.";
const NOT_RESOLVED_ACK: &str = "I understand. Could you please rephrase your \
                                question or provide more details about the \
                                issue?";
const REPHRASE_ACK: &str = "Okay, please rephrase your previous question or \
                            provide more details.";
const FAILURE_PROMPT: &str = "The agent has finished processing your query \
                              due to an error. Start a new query to continue.";

impl EngineState {
    fn submit(&mut self, text: String, handle: &Actor<Self>) {
        let mode = self.conversation.mode();
        if mode != Mode::Idle {
            debug!("ignoring a query in {mode:?} mode");
            return;
        }
        if text.trim().is_empty() {
            debug!("ignoring a blank query");
            return;
        }

        self.conversation.push(LogMessage::new(Sender::User, text.as_str()));
        self.conversation.is_loading = true;

        if self.escalation.is_some() {
            // At most one request is outstanding per conversation.
            debug!("deferring the query until the escalation check settles");
            self.deferred_query = Some(text);
            return;
        }
        self.start_pipeline(text, handle);
    }

    fn start_pipeline(&mut self, query: String, handle: &Actor<Self>) {
        let Some(services) = self.services.clone() else {
            self.fail_pipeline("the engine has no services configured");
            return;
        };
        info!("resolving query: {query}");

        let task_query = query.clone();
        let handle_clone = handle.clone();
        let task_id = self.spawn_task(
            move |task_id| async move {
                let result = services.search(&task_query).await;
                handle_clone
                    .send(KnowledgeBaseSearched { task_id, result })
                    .ok();
            },
            handle,
        );
        self.pipeline = Some(PipelineRun { task_id, query });
    }

    fn on_knowledge_base_searched(
        &mut self,
        task_id: u64,
        result: ServiceResult<Option<KbSearchResult>>,
        handle: &Actor<Self>,
    ) {
        let Some(query) = self.current_query(task_id) else {
            return;
        };
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                self.fail_pipeline(err);
                return;
            }
        };
        if let Some(outcome) = ResolutionOutcome::from_search(&query, result) {
            debug!("answered from the knowledge base");
            self.finish_pipeline(query, outcome, handle);
            return;
        }

        self.conversation.push(
            LogMessage::new(Sender::System, KNOWLEDGE_BASE_MISS)
                .with_intent(Some(Intent::Unknown)),
        );
        let Some(services) = self.services.clone() else {
            self.fail_pipeline("the engine has no services configured");
            return;
        };
        let task_query = query.clone();
        let handle_clone = handle.clone();
        let task_id = self.spawn_task(
            move |task_id| async move {
                let result = services.classify(&task_query).await;
                handle_clone
                    .send(IntentClassified { task_id, result })
                    .ok();
            },
            handle,
        );
        self.pipeline = Some(PipelineRun { task_id, query });
    }

    fn on_intent_classified(
        &mut self,
        task_id: u64,
        result: ServiceResult<Option<IntentClassification>>,
        handle: &Actor<Self>,
    ) {
        let Some(query) = self.current_query(task_id) else {
            return;
        };
        match result {
            Ok(classification) => {
                let outcome =
                    ResolutionOutcome::from_classification(&query, classification);
                self.finish_pipeline(query, outcome, handle);
            }
            Err(err) => self.fail_pipeline(err),
        }
    }

    /// Returns the query of the running pipeline, if `task_id` is the task
    /// it is waiting for.
    fn current_query(&self, task_id: u64) -> Option<String> {
        match &self.pipeline {
            Some(run) if run.task_id == task_id => Some(run.query.clone()),
            _ => {
                debug!("discarding the result of stale task {task_id}");
                None
            }
        }
    }

    fn finish_pipeline(
        &mut self,
        query: String,
        outcome: ResolutionOutcome,
        handle: &Actor<Self>,
    ) {
        let intent = outcome.intent();
        let topic = outcome.topic().map(ToOwned::to_owned);
        info!("resolved query as {intent}");

        self.conversation.push(
            LogMessage::new(Sender::System, outcome.classification_notice())
                .with_intent(Some(intent))
                .with_topic(topic.clone()),
        );
        let response_text = outcome.response_text();
        self.conversation.push(
            LogMessage::new(Sender::Agent, response_text.as_str())
                .with_intent(Some(intent))
                .with_topic(topic.clone()),
        );

        self.pipeline = None;
        self.conversation.is_loading = false;
        self.conversation.is_active = true;
        self.conversation.awaiting_confirmation = true;
        self.conversation.last_agent_intent = Some(intent);

        let req = EscalationRequest {
            query,
            intent,
            kb_snippet: outcome.snippet().map(ToOwned::to_owned),
            response_text,
        };
        self.request_escalation(req, topic, handle);
    }

    /// Ends the running pipeline with an error.
    ///
    /// Messages appended by earlier steps stay in the log.
    fn fail_pipeline<E: Display>(&mut self, err: E) {
        error!("failed to resolve the query: {err}");
        self.pipeline = None;

        self.conversation.push(
            LogMessage::new(
                Sender::System,
                format!(
                    "An error occurred while processing your request. \
                     Details: {err}"
                ),
            )
            .with_intent(Some(Intent::Unknown)),
        );
        self.conversation.awaiting_confirmation = false;
        self.conversation.last_agent_intent = None;
        self.conversation.is_active = false;
        self.conversation.is_loading = false;
        self.conversation.push(
            LogMessage::new(Sender::System, FAILURE_PROMPT)
                .with_intent(Some(Intent::Unknown)),
        );
    }

    fn request_escalation(
        &mut self,
        req: EscalationRequest,
        topic: Option<String>,
        handle: &Actor<Self>,
    ) {
        let Some(services) = self.services.clone() else {
            return;
        };
        let intent = req.intent;
        let handle_clone = handle.clone();
        let task_id = self.spawn_task(
            move |task_id| async move {
                let result = services.advise(&req).await;
                handle_clone
                    .send(EscalationAdvised { task_id, result })
                    .ok();
            },
            handle,
        );
        self.escalation = Some(PendingEscalation {
            task_id,
            intent,
            topic,
        });
    }

    fn on_escalation_advised(
        &mut self,
        task_id: u64,
        result: ServiceResult<Option<EscalationDecision>>,
        handle: &Actor<Self>,
    ) {
        let Some(pending) =
            self.escalation.take_if(|pending| pending.task_id == task_id)
        else {
            debug!("discarding the result of stale task {task_id}");
            return;
        };

        match result {
            Ok(Some(decision)) => {
                let notice = resolution::escalation_notice(pending.intent, &decision);
                if let Some(notice) = notice {
                    info!("escalating: {notice}");
                    self.conversation.push(
                        LogMessage::new(Sender::System, notice)
                            .with_intent(Some(pending.intent))
                            .with_topic(pending.topic),
                    );
                }
            }
            Ok(None) => {}
            Err(err) => warn!("escalation check failed: {err}"),
        }

        if let Some(query) = self.deferred_query.take() {
            self.start_pipeline(query, handle);
        }
    }

    fn start_new_query(&mut self) {
        let mode = self.conversation.mode();
        if mode == Mode::ConfigurationError {
            debug!("ignoring a new query request in {mode:?} mode");
            return;
        }
        if let Some(run) = self.pipeline.take() {
            debug!("abandoning the query: {}", run.query);
            // The task stays registered until its end is reported.
            if let Some(task) = self.running_tasks.get(&run.task_id) {
                task.abort();
            }
        }
        if self.deferred_query.take().is_some() {
            debug!("dropping the query deferred behind the escalation check");
        }
        self.conversation.reopen();
        self.conversation.push(
            LogMessage::new(Sender::System, NEXT_QUESTION)
                .with_intent(Some(Intent::Unknown)),
        );
    }

    fn confirm_resolved(&mut self) {
        let mode = self.conversation.mode();
        if mode != Mode::AwaitingConfirmationResolved {
            debug!("ignoring a resolved confirmation in {mode:?} mode");
            return;
        }
        let intent = self.conversation.last_agent_intent;
        self.conversation.push(
            LogMessage::new(Sender::Agent, RESOLVED_ACK).with_intent(intent),
        );
        self.start_new_query();
    }

    fn confirm_not_resolved(&mut self) {
        let mode = self.conversation.mode();
        if mode != Mode::AwaitingConfirmationResolved {
            debug!("ignoring a not-resolved confirmation in {mode:?} mode");
            return;
        }
        let intent = self.conversation.last_agent_intent;
        self.conversation.push(
            LogMessage::new(Sender::Agent, NOT_RESOLVED_ACK).with_intent(intent),
        );
        self.conversation.reopen();
    }

    fn rephrase_after_unknown(&mut self) {
        let mode = self.conversation.mode();
        if mode != Mode::AwaitingConfirmationUnknown {
            debug!("ignoring a rephrase request in {mode:?} mode");
            return;
        }
        self.conversation.push(
            LogMessage::new(Sender::Agent, REPHRASE_ACK)
                .with_intent(Some(Intent::Unknown)),
        );
        self.conversation.reopen();
    }

    fn on_task_ended(
        &mut self,
        task_id: u64,
        panicked: bool,
        handle: &Actor<Self>,
    ) {
        if self.running_tasks.remove(&task_id).is_none() {
            warn!("unknown task {task_id} ended");
        }
        if !panicked {
            return;
        }

        error!("task {task_id} panicked");
        if self.pipeline.as_ref().is_some_and(|run| run.task_id == task_id) {
            self.fail_pipeline("the request ended unexpectedly");
        } else if self
            .escalation
            .as_ref()
            .is_some_and(|pending| pending.task_id == task_id)
        {
            self.on_escalation_advised(task_id, Ok(None), handle);
        }
    }

    /// Spawns a task working for the conversation and returns its id.
    ///
    /// A [`TaskEndedMessage`] is sent once the task is done, after any
    /// message the task itself sent.
    fn spawn_task<F, Fut>(&mut self, f: F, handle: &Actor<Self>) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task_id = self.next_task_id;
        self.next_task_id += 1;

        let task = tokio::spawn(f(task_id));
        self.running_tasks.insert(task_id, task.abort_handle());

        let handle = handle.clone();
        tokio::spawn(async move {
            let panicked = matches!(task.await, Err(err) if err.is_panic());
            handle.send(TaskEndedMessage { task_id, panicked }).ok();
        });
        task_id
    }
}

impl State for EngineState {
    fn settle(&mut self) {
        let mut next = ConversationView::new(
            &self.conversation,
            self.escalation.is_some(),
        );
        self.view_tx.send_if_modified(move |current| {
            next.revision = current.revision;
            if *current == next {
                return false;
            }
            next.revision += 1;
            *current = next;
            true
        });
    }
}

impl Drop for EngineState {
    fn drop(&mut self) {
        for (_, task) in self.running_tasks.drain() {
            task.abort();
        }
    }
}

#[derive(Debug)]
pub(super) struct Submit(pub String);

impl Message<EngineState> for Submit {
    fn handle(self, state: &mut EngineState, handle: &Actor<EngineState>) {
        state.submit(self.0, handle);
    }
}

#[derive(Debug)]
pub(super) struct StartNewQuery;

impl Message<EngineState> for StartNewQuery {
    fn handle(self, state: &mut EngineState, _handle: &Actor<EngineState>) {
        state.start_new_query();
    }
}

#[derive(Debug)]
pub(super) struct ConfirmResolved;

impl Message<EngineState> for ConfirmResolved {
    fn handle(self, state: &mut EngineState, _handle: &Actor<EngineState>) {
        state.confirm_resolved();
    }
}

#[derive(Debug)]
pub(super) struct ConfirmNotResolved;

impl Message<EngineState> for ConfirmNotResolved {
    fn handle(self, state: &mut EngineState, _handle: &Actor<EngineState>) {
        state.confirm_not_resolved();
    }
}

#[derive(Debug)]
pub(super) struct RephraseAfterUnknown;

impl Message<EngineState> for RephraseAfterUnknown {
    fn handle(self, state: &mut EngineState, _handle: &Actor<EngineState>) {
        state.rephrase_after_unknown();
    }
}

#[derive(Debug)]
pub(super) struct KnowledgeBaseSearched {
    pub(super) task_id: u64,
    pub(super) result: ServiceResult<Option<KbSearchResult>>,
}

impl Message<EngineState> for KnowledgeBaseSearched {
    fn handle(self, state: &mut EngineState, handle: &Actor<EngineState>) {
        state.on_knowledge_base_searched(self.task_id, self.result, handle);
    }
}

#[derive(Debug)]
pub(super) struct IntentClassified {
    pub(super) task_id: u64,
    pub(super) result: ServiceResult<Option<IntentClassification>>,
}

impl Message<EngineState> for IntentClassified {
    fn handle(self, state: &mut EngineState, handle: &Actor<EngineState>) {
        state.on_intent_classified(self.task_id, self.result, handle);
    }
}

#[derive(Debug)]
pub(super) struct EscalationAdvised {
    pub(super) task_id: u64,
    pub(super) result: ServiceResult<Option<EscalationDecision>>,
}

impl Message<EngineState> for EscalationAdvised {
    fn handle(self, state: &mut EngineState, handle: &Actor<EngineState>) {
        state.on_escalation_advised(self.task_id, self.result, handle);
    }
}

#[derive(Debug)]
pub(super) struct TaskEndedMessage {
    pub(super) task_id: u64,
    pub(super) panicked: bool,
}

impl Message<EngineState> for TaskEndedMessage {
    fn handle(self, state: &mut EngineState, handle: &Actor<EngineState>) {
        state.on_task_ended(self.task_id, self.panicked, handle);
    }
}
