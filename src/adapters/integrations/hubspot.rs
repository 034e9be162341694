//! HubSpot adapter. Implements CrmPort over the CRM v3 objects API.

use super::http::{
    from_unix_millis, join_url, null_as_default, parse_rfc3339, path_id, send_json,
};
use crate::domain::{
    Company, Contact, Deal, DealFilter, DealUpdate, Engagement, IntegrationError, NewDeal,
    NewNote, SourceKind, SourceRef, SourceSystem,
};
use crate::ports::CrmPort;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::info;

const PROVIDER: SourceSystem = SourceSystem::Hubspot;
const TOKEN_KEY: &str = "HUBSPOT_ACCESS_TOKEN";
const MAX_LIMIT: u32 = 100;

const COMPANY_PROPERTIES: &[&str] = &[
    "name",
    "domain",
    "industry",
    "lifecyclestage",
    "hubspot_owner_id",
    "annualrevenue",
    "numberofemployees",
    "createdate",
    "hs_lastmodifieddate",
];
const CONTACT_PROPERTIES: &[&str] = &[
    "email",
    "firstname",
    "lastname",
    "phone",
    "jobtitle",
    "associatedcompanyid",
    "lastmodifieddate",
];
const DEAL_PROPERTIES: &[&str] = &[
    "dealname",
    "dealstage",
    "pipeline",
    "amount",
    "closedate",
    "hubspot_owner_id",
    "dealtype",
    "hs_lastmodifieddate",
];

/// HUBSPOT_DEFINED association type ids.
const DEAL_TO_COMPANY: u32 = 5;
const NOTE_TO_COMPANY: u32 = 190;

/// HubSpot CRM client.
///
/// Authenticates with a private-app bearer token. The token is optional at
/// construction; calls without one fail before any request is built.
pub struct HubspotAdapter {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HubspotAdapter {
    pub fn new(client: Client, base_url: String, token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, IntegrationError> {
        let token = self
            .token
            .as_deref()
            .ok_or(IntegrationError::MissingConfig {
                provider: PROVIDER,
                key: TOKEN_KEY,
            })?;
        Ok(self
            .client
            .request(method, join_url(&self.base_url, path))
            .bearer_auth(token))
    }

    async fn get_object(
        &self,
        object: &str,
        id: &str,
        properties: &[&str],
    ) -> Result<HsObject, IntegrationError> {
        let req = self
            .request(
                Method::GET,
                &format!("/crm/v3/objects/{}/{}", object, path_id(PROVIDER, id)?),
            )?
            .query(&[("properties", properties.join(","))]);
        send_json(PROVIDER, req, hubspot_error).await
    }

    async fn search(&self, object: &str, body: Value) -> Result<Vec<HsObject>, IntegrationError> {
        let req = self
            .request(Method::POST, &format!("/crm/v3/objects/{}/search", object))?
            .json(&body);
        let page: HsSearchPage = send_json(PROVIDER, req, hubspot_error).await?;
        Ok(page.results)
    }
}

fn clamp(limit: u32) -> u32 {
    limit.clamp(1, MAX_LIMIT)
}

fn eq_filter(property: &str, value: &str) -> Value {
    json!({ "propertyName": property, "operator": "EQ", "value": value })
}

/// Error envelope: `{status, message, category, correlationId}`.
fn hubspot_error(v: &Value) -> Option<(String, Option<String>)> {
    let message = v.get("message")?.as_str()?.to_string();
    let code = v
        .get("category")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some((message, code))
}

#[derive(Debug, Deserialize)]
struct HsObject {
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    properties: HashMap<String, Value>,
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    updated_at: Option<String>,
}

impl HsObject {
    /// Property as string. JSON `null` and absent are both `None`.
    fn prop(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn prop_f64(&self, name: &str) -> Option<f64> {
        self.prop(name)?.trim().parse().ok()
    }

    fn prop_i64(&self, name: &str) -> Option<i64> {
        self.prop(name)?.trim().parse().ok()
    }

    /// HubSpot dates arrive either as RFC 3339 or as epoch milliseconds.
    fn prop_datetime(&self, name: &str) -> Option<DateTime<Utc>> {
        let raw = self.prop(name)?;
        parse_rfc3339(Some(&raw))
            .or_else(|| from_unix_millis(raw.trim().parse().ok()))
    }

    fn into_company(self) -> Company {
        Company {
            name: self.prop("name"),
            domain: self.prop("domain"),
            industry: self.prop("industry"),
            lifecycle_stage: self.prop("lifecyclestage"),
            owner_id: self.prop("hubspot_owner_id"),
            annual_revenue: self.prop_f64("annualrevenue"),
            num_employees: self.prop_i64("numberofemployees"),
            created_at: self
                .prop_datetime("createdate")
                .or_else(|| parse_rfc3339(self.created_at.as_deref())),
            updated_at: self
                .prop_datetime("hs_lastmodifieddate")
                .or_else(|| parse_rfc3339(self.updated_at.as_deref())),
            source: SourceRef::new(PROVIDER, SourceKind::Company, self.id),
        }
    }

    fn into_contact(self) -> Contact {
        Contact {
            email: self.prop("email"),
            first_name: self.prop("firstname"),
            last_name: self.prop("lastname"),
            phone: self.prop("phone"),
            job_title: self.prop("jobtitle"),
            company_id: self.prop("associatedcompanyid"),
            updated_at: self
                .prop_datetime("lastmodifieddate")
                .or_else(|| parse_rfc3339(self.updated_at.as_deref())),
            source: SourceRef::new(PROVIDER, SourceKind::Contact, self.id),
        }
    }

    fn into_deal(self) -> Deal {
        Deal {
            name: self.prop("dealname"),
            stage: self.prop("dealstage"),
            pipeline: self.prop("pipeline"),
            amount: self.prop_f64("amount"),
            close_date: self.prop_datetime("closedate"),
            owner_id: self.prop("hubspot_owner_id"),
            deal_type: self.prop("dealtype"),
            updated_at: self
                .prop_datetime("hs_lastmodifieddate")
                .or_else(|| parse_rfc3339(self.updated_at.as_deref())),
            source: SourceRef::new(PROVIDER, SourceKind::Deal, self.id),
        }
    }

    fn into_engagement(self, company_id: &str) -> Engagement {
        Engagement {
            body: self.prop("hs_note_body"),
            timestamp: self
                .prop_datetime("hs_timestamp")
                .or_else(|| parse_rfc3339(self.created_at.as_deref())),
            company_id: Some(company_id.to_string()),
            source: SourceRef::new(PROVIDER, SourceKind::Note, self.id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HsSearchPage {
    #[serde(default, deserialize_with = "null_as_default")]
    results: Vec<HsObject>,
}

fn deal_properties(
    name: Option<&str>,
    pipeline: Option<&str>,
    stage: Option<&str>,
    amount: Option<f64>,
    close_date: Option<DateTime<Utc>>,
    deal_type: Option<&str>,
) -> Map<String, Value> {
    let mut props = Map::new();
    if let Some(v) = name {
        props.insert("dealname".into(), json!(v));
    }
    if let Some(v) = pipeline {
        props.insert("pipeline".into(), json!(v));
    }
    if let Some(v) = stage {
        props.insert("dealstage".into(), json!(v));
    }
    if let Some(v) = amount {
        props.insert("amount".into(), json!(v.to_string()));
    }
    if let Some(v) = close_date {
        props.insert("closedate".into(), json!(v.to_rfc3339()));
    }
    if let Some(v) = deal_type {
        props.insert("dealtype".into(), json!(v));
    }
    props
}

fn association(to_id: &str, type_id: u32) -> Value {
    json!({
        "to": { "id": to_id },
        "types": [{ "associationCategory": "HUBSPOT_DEFINED", "associationTypeId": type_id }]
    })
}

#[async_trait::async_trait]
impl CrmPort for HubspotAdapter {
    async fn get_company(&self, id: &str) -> Result<Company, IntegrationError> {
        Ok(self
            .get_object("companies", id, COMPANY_PROPERTIES)
            .await?
            .into_company())
    }

    async fn search_companies(
        &self,
        term: &str,
        limit: u32,
    ) -> Result<Vec<Company>, IntegrationError> {
        let body = json!({
            "query": term,
            "limit": clamp(limit),
            "properties": COMPANY_PROPERTIES,
        });
        let results = self.search("companies", body).await?;
        Ok(results.into_iter().map(HsObject::into_company).collect())
    }

    async fn company_contacts(
        &self,
        company_id: &str,
        limit: u32,
    ) -> Result<Vec<Contact>, IntegrationError> {
        let body = json!({
            "filterGroups": [{ "filters": [eq_filter("associatedcompanyid", company_id)] }],
            "limit": clamp(limit),
            "properties": CONTACT_PROPERTIES,
        });
        let results = self.search("contacts", body).await?;
        Ok(results.into_iter().map(HsObject::into_contact).collect())
    }

    async fn get_contact(&self, id: &str) -> Result<Contact, IntegrationError> {
        Ok(self
            .get_object("contacts", id, CONTACT_PROPERTIES)
            .await?
            .into_contact())
    }

    async fn search_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, IntegrationError> {
        let mut filters = Vec::new();
        if let Some(p) = &filter.pipeline {
            filters.push(eq_filter("pipeline", p));
        }
        if let Some(s) = &filter.stage {
            filters.push(eq_filter("dealstage", s));
        }
        if let Some(t) = &filter.deal_type {
            filters.push(eq_filter("dealtype", t));
        }
        if let Some(c) = &filter.company_id {
            filters.push(eq_filter("associations.company", c));
        }
        let mut body = json!({
            "limit": clamp(filter.limit),
            "properties": DEAL_PROPERTIES,
            "sorts": [{ "propertyName": "hs_lastmodifieddate", "direction": "DESCENDING" }],
        });
        if !filters.is_empty() {
            body["filterGroups"] = json!([{ "filters": filters }]);
        }
        let results = self.search("deals", body).await?;
        Ok(results.into_iter().map(HsObject::into_deal).collect())
    }

    async fn create_deal(&self, deal: &NewDeal) -> Result<Deal, IntegrationError> {
        if deal.name.trim().is_empty() {
            return Err(IntegrationError::InvalidInput {
                provider: PROVIDER,
                message: "deal name is required".to_string(),
            });
        }
        let mut body = json!({
            "properties": deal_properties(
                Some(&deal.name),
                deal.pipeline.as_deref(),
                deal.stage.as_deref(),
                deal.amount,
                deal.close_date,
                deal.deal_type.as_deref(),
            ),
        });
        if let Some(company_id) = &deal.company_id {
            body["associations"] = json!([association(company_id, DEAL_TO_COMPANY)]);
        }
        let req = self
            .request(Method::POST, "/crm/v3/objects/deals")?
            .json(&body);
        let created: HsObject = send_json(PROVIDER, req, hubspot_error).await?;
        info!(deal_id = %created.id, "created deal");
        Ok(created.into_deal())
    }

    async fn update_deal(&self, id: &str, update: &DealUpdate) -> Result<Deal, IntegrationError> {
        if update.is_empty() {
            return Err(IntegrationError::InvalidInput {
                provider: PROVIDER,
                message: "deal update has no fields".to_string(),
            });
        }
        let body = json!({
            "properties": deal_properties(
                update.name.as_deref(),
                None,
                update.stage.as_deref(),
                update.amount,
                update.close_date,
                None,
            ),
        });
        let req = self
            .request(
                Method::PATCH,
                &format!("/crm/v3/objects/deals/{}", path_id(PROVIDER, id)?),
            )?
            .json(&body);
        let updated: HsObject = send_json(PROVIDER, req, hubspot_error).await?;
        Ok(updated.into_deal())
    }

    async fn create_note(&self, note: &NewNote) -> Result<Engagement, IntegrationError> {
        let timestamp = note.timestamp.unwrap_or_else(Utc::now);
        let body = json!({
            "properties": {
                "hs_note_body": note.body,
                "hs_timestamp": timestamp.to_rfc3339(),
            },
            "associations": [association(&note.company_id, NOTE_TO_COMPANY)],
        });
        let req = self
            .request(Method::POST, "/crm/v3/objects/notes")?
            .json(&body);
        let created: HsObject = send_json(PROVIDER, req, hubspot_error).await?;
        info!(note_id = %created.id, company_id = %note.company_id, "logged note");
        Ok(created.into_engagement(&note.company_id))
    }
}
