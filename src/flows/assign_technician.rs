use std::sync::Arc;

use async_trait::async_trait;

use crate::conversation::{ConversationId, Scratch};
use crate::error::Error;
use crate::flow::{FlowDefinition, Input, Matcher, Prompt, Reply, StepHandler, StepOutput, step_fn};
use crate::flows::browse::{BrowsePrompt, Item, Listing, TurnPage, PAGE_PREFIX, page_matcher, pick_matcher};
use crate::flows::{FlowKind, Services, required_id, with_cancel, with_nav};
use crate::markup;
use crate::navigation::Cursor;
use crate::repository::{RecordId, RepoError, Repository};
use crate::request::{ServiceRequest, Status, Technician};
use crate::role::Role;

/// Dispatchers go through new requests and hand them to technicians of the
/// same region.
///
/// Scratch keeps the picked `request` and `technician` ids and one cursor
/// per list.
pub fn flow(services: &Services) -> FlowDefinition {
    let new_requests = Arc::new(NewRequests { requests: services.requests.clone() });
    let technicians = Arc::new(RegionTechnicians {
        requests: services.requests.clone(),
        technicians: services.technicians.clone(),
    });
    let page_size = services.page_size;

    FlowDefinition::builder(FlowKind::AssignTechnician.id())
        .states(&["request", "technician", "confirm"])
        .roles(Role::DISPATCHERS)
        .cancel_on_failure()
        .prompt_from("request", BrowsePrompt::new(new_requests.clone(), page_size))
        .prompt_from("technician", BrowsePrompt::new(technicians.clone(), page_size))
        .prompt_from("confirm", ConfirmPrompt {
            requests: services.requests.clone(),
            technicians: services.technicians.clone(),
        })
        .on("request", page_matcher(), "request", TurnPage::new(new_requests, page_size))
        .on("request", pick_matcher(), "technician",
            PickRequest { requests: services.requests.clone() })
        .on("technician", page_matcher(), "technician", TurnPage::new(technicians, page_size))
        .on("technician", pick_matcher(), "confirm",
            PickTechnician {
                requests: services.requests.clone(),
                technicians: services.technicians.clone(),
            })
        .finish("confirm", Matcher::choice("confirm", &["yes"]),
                Assign { requests: services.requests.clone(), technicians: services.technicians.clone() })
        .finish("confirm", Matcher::choice("confirm", &["no"]), step_fn(|_input, _scratch| {
            Ok(StepOutput::cancel(Reply::text("Nothing was assigned.")))
        }))
        .build()
}

const TECHNICIANS: &str = "technicians";

fn picked(input: &Input) -> Result<RecordId, Error> {
    match input {
        Input::Index(id) => Ok(*id as RecordId),
        other => Err(format!("pick from {other:?}").into()),
    }
}

struct NewRequests {
    requests: Arc<dyn Repository<ServiceRequest>>,
}

#[async_trait]
impl Listing for NewRequests {
    fn collection(&self) -> &'static str { "requests" }
    fn title(&self) -> &'static str { "New requests" }
    fn empty_text(&self) -> &'static str { "There are no new requests." }

    async fn items(&self, _scratch: &Scratch) -> Result<Vec<Item>, Error> {
        let new = self.requests.search(&|r: &ServiceRequest| r.status() == Status::New).await?;
        Ok(new.into_iter()
            .filter_map(|r| {
                let id = r.id?;
                let mut text = format!("{}\ncreated {}", r.summary(), markup::time_ago(r.created_at));
                if let Some(address) = &r.address {
                    text.push_str(&format!("\n{address}"));
                }
                Some(Item { id, text, label: format!("Take #{id}") })
            })
            .collect())
    }
}

/// Technicians working where the picked request is
struct RegionTechnicians {
    requests: Arc<dyn Repository<ServiceRequest>>,
    technicians: Arc<dyn Repository<Technician>>,
}

#[async_trait]
impl Listing for RegionTechnicians {
    fn collection(&self) -> &'static str { TECHNICIANS }
    fn title(&self) -> &'static str { "Technicians" }
    fn empty_text(&self) -> &'static str { "Nobody works in this region." }

    async fn items(&self, scratch: &Scratch) -> Result<Vec<Item>, Error> {
        let request = self.requests.get(required_id(scratch, "request")?).await?;
        let region = request.region;
        let found = self.technicians.search(&move |t: &Technician| t.region == region).await?;
        Ok(found.into_iter()
            .filter_map(|t| {
                let id = t.id?;
                Some(Item { id, text: format!("{}, {}", t.name, t.region), label: t.name })
            })
            .collect())
    }
}

struct PickRequest {
    requests: Arc<dyn Repository<ServiceRequest>>,
}

#[async_trait]
impl StepHandler for PickRequest {
    async fn handle(&self, _id: ConversationId, input: Input, _scratch: &Scratch) -> Result<StepOutput, Error> {
        let request_id = picked(&input)?;
        let request = match self.requests.get(request_id).await {
            Ok(r) => r,
            Err(RepoError::NotFound(_)) =>
                return Ok(StepOutput::stay(with_cancel(
                    Reply::text(format!("Request #{request_id} is gone."))
                        .button("Show list", Matcher::token(PAGE_PREFIX, "prev"))))),
            Err(e) => return Err(e.into()),
        };
        if request.status() != Status::New {
            return Ok(StepOutput::stay(with_cancel(
                Reply::text(format!("Request #{request_id} is already {}.", request.status()))
                    .button("Show list", Matcher::token(PAGE_PREFIX, "prev")))))
        }
        // Technician list starts from the top for every request
        Ok(StepOutput::advance()
           .set("request", request_id)
           .set(Cursor::scratch_key_of(TECHNICIANS), serde_json::Value::Null))
    }
}

/// Note for a technician outside the request's region, None if they match
fn region_mismatch(request: &ServiceRequest, technician: &Technician) -> Option<String> {
    if technician.region == request.region {
        return None
    }
    Some(format!("{} works in {}, the request is in {}.",
                 markup::escape_html(&technician.name), technician.region, request.region))
}

struct PickTechnician {
    requests: Arc<dyn Repository<ServiceRequest>>,
    technicians: Arc<dyn Repository<Technician>>,
}

#[async_trait]
impl StepHandler for PickTechnician {
    async fn handle(&self, id: ConversationId, input: Input, scratch: &Scratch) -> Result<StepOutput, Error> {
        let technician_id = picked(&input)?;
        let technician = match self.technicians.get(technician_id).await {
            Ok(t) => t,
            Err(RepoError::NotFound(_)) =>
                return Ok(StepOutput::stay(with_nav(Reply::text("This technician is not available anymore.")))),
            Err(e) => return Err(e.into()),
        };
        let request = self.requests.get(required_id(scratch, "request")?).await?;
        if let Some(note) = region_mismatch(&request, &technician) {
            log::info!("{id} picked technician {technician_id} from another region");
            return Ok(StepOutput::stay(with_nav(Reply::text(note)
                .button("Show list", Matcher::token(PAGE_PREFIX, "prev")))))
        }
        Ok(StepOutput::advance().set("technician", technician_id))
    }
}

struct ConfirmPrompt {
    requests: Arc<dyn Repository<ServiceRequest>>,
    technicians: Arc<dyn Repository<Technician>>,
}

impl ConfirmPrompt {
    async fn text(&self, scratch: &Scratch) -> Result<String, Error> {
        let request = self.requests.get(required_id(scratch, "request")?).await?;
        let technician = self.technicians.get(required_id(scratch, "technician")?).await?;
        let who = match technician.user_id {
            Some(uid) => markup::user_link(uid, &technician.name),
            None => markup::escape_html(&technician.name),
        };
        Ok(format!("Assign {} to {who}?", markup::escape_html(&request.summary())))
    }
}

#[async_trait]
impl Prompt for ConfirmPrompt {
    async fn render(&self, scratch: &Scratch) -> Reply {
        let text = match self.text(scratch).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("assign confirm prompt: {e}");
                "Assign the technician?".to_string()
            },
        };
        with_nav(Reply::text(text)
                 .button("Assign", Matcher::token("confirm", "yes"))
                 .button("Don't", Matcher::token("confirm", "no")))
    }
}

struct Assign {
    requests: Arc<dyn Repository<ServiceRequest>>,
    technicians: Arc<dyn Repository<Technician>>,
}

#[async_trait]
impl StepHandler for Assign {
    async fn handle(&self, id: ConversationId, _input: Input, scratch: &Scratch) -> Result<StepOutput, Error> {
        let request_id = required_id(scratch, "request")?;
        let technician = self.technicians.get(required_id(scratch, "technician")?).await?;
        let technician_id = technician.id.ok_or(RepoError::MissingId)?;

        let mut request = self.requests.get(request_id).await?;
        if let Some(note) = region_mismatch(&request, &technician) {
            log::warn!("{id} tried to assign request {request_id} across regions");
            return Ok(StepOutput::cancel(Reply::text(format!("{note}\nNothing was assigned."))))
        }
        if let Err(why) = request.assign(technician_id, id.user_id) {
            log::info!("{id} can't assign request {request_id}: {why}");
            return Ok(StepOutput::cancel(Reply::text(format!(
                "Request #{request_id} was assigned by somebody else meanwhile."))))
        }

        match self.requests.update(request).await {
            Ok(_) => {
                log::info!("{id} assigned request {request_id} to technician {technician_id}");
                Ok(StepOutput::advance().reply(Reply::text(format!(
                    "Request #{request_id} is assigned to {}.", markup::escape_html(&technician.name)))))
            },
            Err(RepoError::Conflict { .. }) => {
                log::info!("{id} lost the race for request {request_id}");
                Ok(StepOutput::cancel(Reply::text(format!(
                    "Request #{request_id} was changed by somebody else meanwhile, nothing was assigned."))))
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Region;
    use crate::context_store::ContextStore;
    use crate::dispatch::Outcome;
    use crate::event::StepEvent;
    use crate::flow::Directive;
    use crate::flows::testing::{CONTROLLER, setup};
    use crate::repository::{Filter, MemRepository};
    use crate::request::RequestKind;

    const NAME: &str = "assign_technician";

    fn controller() -> ConversationId {
        ConversationId::new(CONTROLLER as i64, CONTROLLER)
    }

    fn sel(s: &str) -> StepEvent {
        StepEvent::Selection(s.to_string())
    }

    fn technician(name: &str, region: Region) -> Technician {
        Technician { id: None, version: 0, name: name.to_string(), region, user_id: None }
    }

    fn repair(region: Region) -> ServiceRequest {
        ServiceRequest::new(RequestKind::Repair { description: "Line is dead".into() }, 1, 1, region)
    }

    fn tokens(outcome: &Outcome) -> Vec<String> {
        outcome.reply()
            .map(|r| r.buttons.iter().map(|b| b.token.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_browse_pick_assign() {
        let s = setup(vec![technician("Aziz", Region::Toshkent),
                           technician("Bobur", Region::Buxoro),
                           technician("Dilshod", Region::Buxoro)]);
        for region in [Region::Toshkent, Region::Buxoro] {
            s.requests.create(repair(region)).await.unwrap();
        }

        let started = s.engine.start(controller(), NAME).await;
        assert_eq!(vec!["pick 1", "page next", "nav cancel"], tokens(&started));

        let next = s.engine.dispatch(controller(), NAME, sel("page next")).await;
        assert_eq!(vec!["pick 2", "page prev", "nav cancel"], tokens(&next));
        let clamped = s.engine.dispatch(controller(), NAME, sel("page next")).await;
        assert_eq!(tokens(&next), tokens(&clamped));

        // Only technicians of Buxoro are offered
        let technicians = s.engine.dispatch(controller(), NAME, sel("pick 2")).await;
        assert_eq!(Some("technician"), technicians.state());
        assert_eq!(vec!["pick 2", "page next", "nav cancel"], tokens(&technicians));
        let technicians = s.engine.dispatch(controller(), NAME, sel("page next")).await;
        assert_eq!(vec!["pick 3", "page prev", "nav cancel"], tokens(&technicians));

        assert_eq!(Some("confirm"), s.engine.dispatch(controller(), NAME, sel("pick 3")).await.state());
        let done = s.engine.dispatch(controller(), NAME, sel("confirm yes")).await;
        assert!(matches!(done, Outcome::Completed { .. }));

        let request = s.requests.get(2).await.unwrap();
        assert_eq!(Status::Assigned, request.status());
        let assignment = request.assignment.unwrap();
        assert_eq!(3, assignment.technician);
        assert_eq!(CONTROLLER, assignment.by);
        assert_eq!(1, request.version);
        assert_eq!(Status::New, s.requests.get(1).await.unwrap().status());
    }

    #[tokio::test]
    async fn test_clients_are_denied() {
        let s = setup(Vec::new());
        assert_eq!(Outcome::Denied, s.engine.start(ConversationId::new(1, 1), NAME).await);
    }

    #[tokio::test]
    async fn test_somebody_else_was_quicker() {
        let s = setup(vec![technician("Aziz", Region::Toshkent),
                           technician("Jasur", Region::Toshkent)]);
        s.requests.create(repair(Region::Toshkent)).await.unwrap();

        s.engine.start(controller(), NAME).await;
        s.engine.dispatch(controller(), NAME, sel("pick 1")).await;
        s.engine.dispatch(controller(), NAME, sel("pick 1")).await;

        // Another controller assigns the same request in the meantime
        let mut request = s.requests.get(1).await.unwrap();
        request.assign(2, 999).unwrap();
        s.requests.update(request).await.unwrap();

        let outcome = s.engine.dispatch(controller(), NAME, sel("confirm yes")).await;
        assert!(matches!(&outcome, Outcome::Cancelled { reply }
                         if reply.text.contains("somebody else")));
        assert_eq!(Some(2), s.requests.get(1).await.unwrap().assignment.map(|a| a.technician));
        assert_eq!(None, s.engine.active_flow(controller()).await);
    }

    /// Somebody always writes the request just before us
    struct Racing(MemRepository<ServiceRequest>);

    #[async_trait]
    impl Repository<ServiceRequest> for Racing {
        async fn get(&self, id: RecordId) -> Result<ServiceRequest, RepoError> {
            self.0.get(id).await
        }

        async fn search(&self, filter: &Filter<ServiceRequest>) -> Result<Vec<ServiceRequest>, RepoError> {
            self.0.search(filter).await
        }

        async fn create(&self, record: ServiceRequest) -> Result<ServiceRequest, RepoError> {
            self.0.create(record).await
        }

        async fn update(&self, record: ServiceRequest) -> Result<ServiceRequest, RepoError> {
            let mut other = self.0.get(record.id.ok_or(RepoError::MissingId)?).await?;
            other.address = Some("Amir Temur 1".into());
            self.0.update(other).await?;
            self.0.update(record).await
        }
    }

    #[tokio::test]
    async fn test_lost_update_cancels() {
        let s = setup(vec![technician("Aziz", Region::Toshkent)]);
        s.requests.create(repair(Region::Toshkent)).await.unwrap();
        let handler = Assign {
            requests: Arc::new(Racing(s.requests.clone())),
            technicians: Arc::new(s.technicians.clone()),
        };
        let mut scratch = Scratch::new();
        scratch.insert("request".into(), serde_json::json!(1));
        scratch.insert("technician".into(), serde_json::json!(1));

        let out = handler.handle(controller(), Input::Choice("yes".into()), &scratch).await.unwrap();
        assert_eq!(Directive::Cancel, out.directive);
        assert!(out.reply.text.contains("changed by somebody else"));

        let stored = s.requests.get(1).await.unwrap();
        assert_eq!(Status::New, stored.status());
        assert_eq!(Some("Amir Temur 1".to_string()), stored.address);
    }

    #[tokio::test]
    async fn test_technician_of_another_region() {
        let s = setup(vec![technician("Aziz", Region::Toshkent),
                           technician("Bobur", Region::Buxoro)]);
        s.requests.create(repair(Region::Buxoro)).await.unwrap();

        s.engine.start(controller(), NAME).await;
        s.engine.dispatch(controller(), NAME, sel("pick 1")).await;

        // Aziz is not on the list, a stale button still says "pick 1"
        let outcome = s.engine.dispatch(controller(), NAME, sel("pick 1")).await;
        assert!(matches!(&outcome, Outcome::Stayed { state, reply }
                         if state == "technician" && reply.text.contains("works in")));
        assert_eq!(None, s.store.get(controller()).await.unwrap().get("technician"));

        assert_eq!(Some("confirm"), s.engine.dispatch(controller(), NAME, sel("pick 2")).await.state());
    }

    #[tokio::test]
    async fn test_assign_checks_region_again() {
        let s = setup(vec![technician("Aziz", Region::Toshkent)]);
        s.requests.create(repair(Region::Buxoro)).await.unwrap();
        let handler = Assign {
            requests: Arc::new(s.requests.clone()),
            technicians: Arc::new(s.technicians.clone()),
        };
        let mut scratch = Scratch::new();
        scratch.insert("request".into(), serde_json::json!(1));
        scratch.insert("technician".into(), serde_json::json!(1));

        let out = handler.handle(controller(), Input::Choice("yes".into()), &scratch).await.unwrap();
        assert_eq!(Directive::Cancel, out.directive);
        assert_eq!(Status::New, s.requests.get(1).await.unwrap().status());
    }

    #[tokio::test]
    async fn test_no_requests() {
        let s = setup(Vec::new());
        let started = s.engine.start(controller(), NAME).await;
        assert_eq!(Some("There are no new requests."), started.reply().map(|r| r.text.as_str()));
        assert_eq!(vec!["nav cancel"], tokens(&started));
    }
}
