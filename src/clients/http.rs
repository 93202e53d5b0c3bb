use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::clients::{
    CollaboratorError, IdentityStore, NotificationGateway, OrderStore, RestaurantStore,
};
use crate::config::CollaboratorUrls;
use crate::models::id::RecordId;
use crate::models::order::{Order, OrderStatus};
use crate::models::party::{Person, Restaurant};

/// REST client for the order, restaurant, user and notification services.
#[derive(Clone)]
pub struct HttpCollaborators {
    client: Client,
    urls: CollaboratorUrls,
}

impl HttpCollaborators {
    pub fn new(urls: CollaboratorUrls) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .build()
            .map_err(|err| CollaboratorError::Unavailable(format!("http client: {err}")))?;

        Ok(Self { client, urls })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.urls.service_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, CollaboratorError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| transport_error(what, err))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(CollaboratorError::NotFound(what.to_string())),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                Err(CollaboratorError::Timeout(what.to_string()))
            }
            status => Err(CollaboratorError::Unavailable(format!(
                "{what} returned {status}"
            ))),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, url: String, what: &str) -> Result<T, CollaboratorError> {
        let response = self.send(self.client.get(url), what).await?;
        decode(response, what).await
    }
}

fn transport_error(what: &str, err: reqwest::Error) -> CollaboratorError {
    if err.is_timeout() {
        CollaboratorError::Timeout(what.to_string())
    } else {
        CollaboratorError::Unavailable(format!("{what}: {err}"))
    }
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, CollaboratorError> {
    response
        .json::<T>()
        .await
        .map_err(|err| CollaboratorError::Unavailable(format!("{what} returned malformed body: {err}")))
}

#[async_trait]
impl OrderStore for HttpCollaborators {
    async fn get_order(&self, id: &RecordId) -> Result<Order, CollaboratorError> {
        let what = format!("order {id}");
        self.fetch(format!("{}/get/{id}", self.urls.order_service), &what)
            .await
    }

    async fn set_order_status(
        &self,
        id: &RecordId,
        status: OrderStatus,
        driver_id: Option<Uuid>,
    ) -> Result<Order, CollaboratorError> {
        let what = format!("order {id}");
        let mut body = json!({ "status": status });
        if let Some(driver_id) = driver_id {
            body["driverId"] = json!(driver_id);
        }

        let request = self
            .client
            .patch(format!("{}/{id}/status", self.urls.order_service))
            .json(&body);
        let response = self.send(request, &what).await?;
        decode(response, &what).await
    }
}

#[async_trait]
impl RestaurantStore for HttpCollaborators {
    async fn get_restaurant(&self, id: &RecordId) -> Result<Restaurant, CollaboratorError> {
        let what = format!("restaurant {id}");
        self.fetch(format!("{}/getid/{id}", self.urls.restaurant_service), &what)
            .await
    }
}

#[async_trait]
impl IdentityStore for HttpCollaborators {
    async fn get_person(&self, id: &RecordId) -> Result<Person, CollaboratorError> {
        let what = format!("person {id}");
        self.fetch(format!("{}/{id}", self.urls.user_service), &what)
            .await
    }
}

#[async_trait]
impl NotificationGateway for HttpCollaborators {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        kind: &str,
        payload: Value,
    ) -> Result<(), CollaboratorError> {
        let request = self
            .client
            .post(format!("{}/email", self.urls.notification_service))
            .json(&json!({
                "to": to,
                "subject": subject,
                "text": body,
                "type": kind,
                "payload": payload,
            }));
        self.send(request, "email notification").await?;
        Ok(())
    }

    async fn send_sms(
        &self,
        to: &str,
        message: &str,
        kind: &str,
        payload: Value,
    ) -> Result<(), CollaboratorError> {
        let request = self
            .client
            .post(format!("{}/sms", self.urls.notification_service))
            .json(&json!({
                "to": to,
                "message": message,
                "type": kind,
                "payload": payload,
            }));
        self.send(request, "sms notification").await?;
        Ok(())
    }
}
