use std::sync::Arc;

use tracing::error;

use givebridge_core::{DonationRecord, GiftPayload, WishlistRequest};
use givebridge_donations::{DonationDraft, DonationRecorder};

use crate::{RequestError, RequestLifecycle};

/// The two-step fulfillment flow: transition the request, then record the
/// fulfilling donation. The steps are independent writes with no
/// all-or-nothing guarantee, so a donation-write failure leaves the request
/// marked fulfilled with no matching donation. That intermediate state is
/// surfaced as a divergence instead of being rolled back; there is no
/// compensating transaction.
pub struct FulfillmentSaga {
    lifecycle: Arc<RequestLifecycle>,
    recorder: Arc<DonationRecorder>,
}

#[derive(Debug)]
pub struct SagaOutcome {
    pub request: WishlistRequest,
    /// The recorded donation, when the second step landed.
    pub donation: Option<DonationRecord>,
    /// Why the donation write failed, when it did. The request is already
    /// fulfilled at that point.
    pub divergence: Option<String>,
}

impl FulfillmentSaga {
    pub fn new(lifecycle: Arc<RequestLifecycle>, recorder: Arc<DonationRecorder>) -> Self {
        Self {
            lifecycle,
            recorder,
        }
    }

    /// Fulfills the request for the donor, then records the donation against
    /// the request's recipient and category. A failed first step aborts with
    /// an error and writes nothing; a failed second step reports divergence.
    pub async fn run(
        &self,
        request_id: &str,
        donor_id: &str,
        gift: GiftPayload,
        pickup_address: Option<String>,
        time_slot: Option<String>,
    ) -> Result<SagaOutcome, RequestError> {
        let request = self.lifecycle.fulfill(request_id, donor_id).await?;

        let draft = DonationDraft {
            category: request.category,
            donor_id: donor_id.to_string(),
            recipient_id: Some(request.recipient_id.clone()),
            payload: gift,
            pickup_address,
            time_slot,
        };
        match self.recorder.record(draft).await {
            Ok(donation) => Ok(SagaOutcome {
                request,
                donation: Some(donation),
                divergence: None,
            }),
            Err(err) => {
                error!(
                    request = request_id,
                    donor = donor_id,
                    %err,
                    "request marked fulfilled but donation write failed",
                );
                Ok(SagaOutcome {
                    request,
                    donation: None,
                    divergence: Some(err.to_string()),
                })
            }
        }
    }
}
