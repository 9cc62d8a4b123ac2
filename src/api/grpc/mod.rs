use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::engine::allocation::{ClaimFlow, ClaimRequest, claim_bags, selectable_batch_sizes};
use crate::engine::matching::matching_campaigns;
use crate::models::campaign::CampaignListing as CampaignListingModel;
use crate::models::driver::Driver;
use crate::models::driver_campaign::DriverCampaign;
use crate::models::event::ProgressEvent;
use crate::state::AppState;

pub mod pb {
    tonic::include_proto!("driver");
}

use pb::driver_service_server::DriverService;
use pb::{
    CampaignListing, ClaimBagsRequest, ClaimResponse, DriverResponse, GetDriverRequest,
    ListCampaignsRequest, ListCampaignsResponse, ProgressEventMessage, WatchProgressRequest,
};

pub struct GrpcDriverService {
    state: Arc<AppState>,
}

impl GrpcDriverService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

fn driver_to_proto(d: &Driver) -> DriverResponse {
    DriverResponse {
        id: d.id.to_string(),
        name: d.name.clone(),
        rank: d.rank.as_str().to_string(),
        completed_missions_count: d.completed_missions_count,
        uncompleted_missions_count: d.uncompleted_missions_count,
        failed_missions_count: d.failed_missions_count,
        current_earnings: d.current_earnings,
        zip_codes: d.zip_codes.iter().cloned().collect(),
        states: d.states.iter().cloned().collect(),
    }
}

fn listing_to_proto(l: &CampaignListingModel, driver: &Driver) -> CampaignListing {
    CampaignListing {
        id: l.campaign.id.to_string(),
        name: l.campaign.name.clone(),
        advertiser_name: l.advertiser_name.clone(),
        advertiser_logo: l.advertiser_logo.clone().unwrap_or_default(),
        bags_count: l.campaign.bags_count,
        remaining_bags: l.campaign.remaining_bags,
        start_date: l.campaign.start_date.to_rfc3339(),
        selectable_batch_sizes: selectable_batch_sizes(
            driver.rank,
            driver.uncompleted_missions_count,
            l.campaign.remaining_bags,
        ),
    }
}

fn claim_to_proto(c: &DriverCampaign) -> ClaimResponse {
    ClaimResponse {
        id: c.id.to_string(),
        driver_id: c.driver_id.to_string(),
        campaign_id: c.campaign_id.to_string(),
        bags_count: c.bags_count,
        bags_delivered: c.bags_delivered,
        bags_failed: c.bags_failed,
        status: c.status.as_str().to_string(),
        potential_earnings: c.potential_earnings,
        current_earnings: c.current_earnings,
    }
}

fn event_to_proto(event: &ProgressEvent) -> Option<ProgressEventMessage> {
    let payload_json = serde_json::to_string(event).ok()?;
    Some(ProgressEventMessage {
        kind: event.kind().to_string(),
        driver_id: event.driver_id().to_string(),
        payload_json,
    })
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(raw).map_err(|_| Status::invalid_argument(format!("{field} must be a uuid")))
}

fn parse_flow(s: &str) -> Result<ClaimFlow, Status> {
    match s {
        "" | "request" => Ok(ClaimFlow::Request),
        "ship" => Ok(ClaimFlow::Ship),
        other => Err(Status::invalid_argument(format!(
            "unknown flow: {other}, expected request/ship"
        ))),
    }
}

#[tonic::async_trait]
impl DriverService for GrpcDriverService {
    async fn get_driver(
        &self,
        request: Request<GetDriverRequest>,
    ) -> Result<Response<DriverResponse>, Status> {
        let req = request.into_inner();
        let driver_id = parse_id("driver_id", &req.driver_id)?;

        let driver = self.state.store.driver(driver_id)?;
        Ok(Response::new(driver_to_proto(&driver)))
    }

    async fn list_campaigns(
        &self,
        request: Request<ListCampaignsRequest>,
    ) -> Result<Response<ListCampaignsResponse>, Status> {
        let req = request.into_inner();
        let driver_id = parse_id("driver_id", &req.driver_id)?;

        let driver = self.state.store.driver(driver_id)?;
        let campaigns = matching_campaigns(&self.state, driver_id)?
            .iter()
            .map(|listing| listing_to_proto(listing, &driver))
            .collect();

        Ok(Response::new(ListCampaignsResponse { campaigns }))
    }

    async fn claim_bags(
        &self,
        request: Request<ClaimBagsRequest>,
    ) -> Result<Response<ClaimResponse>, Status> {
        let req = request.into_inner();
        let driver_id = parse_id("driver_id", &req.driver_id)?;
        let campaign_id = parse_id("campaign_id", &req.campaign_id)?;
        let flow = parse_flow(&req.flow)?;

        let claim = claim_bags(
            &self.state,
            driver_id,
            ClaimRequest {
                campaign_id,
                bags: req.bags,
                flow,
            },
        )?;

        Ok(Response::new(claim_to_proto(&claim)))
    }

    type WatchProgressStream =
        Pin<Box<dyn Stream<Item = Result<ProgressEventMessage, Status>> + Send>>;

    async fn watch_progress(
        &self,
        request: Request<WatchProgressRequest>,
    ) -> Result<Response<Self::WatchProgressStream>, Status> {
        let req = request.into_inner();
        let driver_id = if req.driver_id.is_empty() {
            None
        } else {
            Some(parse_id("driver_id", &req.driver_id)?)
        };

        let rx = self.state.progress_events_tx.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
            Ok(event) if driver_id.is_none_or(|id| id == event.driver_id()) => {
                event_to_proto(&event).map(Ok)
            }
            _ => None,
        });

        Ok(Response::new(Box::pin(stream)))
    }
}
