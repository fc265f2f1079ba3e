// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use reqwest::{
    header::{HeaderValue, ACCEPT, CONTENT_TYPE},
    Client, RequestBuilder, Url,
};

use crate::error::BeaconClientError;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A reqwest client bound to one endpoint base URL. All requests carry the
/// configured timeout and JSON content negotiation headers.
#[derive(Debug, Clone)]
pub struct ClientWithBaseUrl {
    client: Client,
    base_url: Url,
}

impl ClientWithBaseUrl {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, BeaconClientError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn get(&self, path: &str) -> Result<RequestBuilder, BeaconClientError> {
        let url = self.base_url.join(path)?;
        Ok(self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE)))
    }

    pub fn post(&self, path: &str) -> Result<RequestBuilder, BeaconClientError> {
        let url = self.base_url.join(path)?;
        Ok(self
            .client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))
            .header(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE)))
    }
}
