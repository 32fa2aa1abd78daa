// Copyright 2021 Dmitry Tantsur <dtantsur@protonmail.com>
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

use std::env;

use futures::pin_mut;
use futures::stream::TryStreamExt;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct NetworksRoot {
    pub networks: Vec<Network>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let limit = env::args().nth(1).unwrap_or_else(|| "50".into());

    let mut session = neutronclient::Session::from_env()
        .expect("Failed to create a session from the environment");

    let pages = session.list_pages("networks", "/networks", &[("limit", limit.as_str())]);
    pin_mut!(pages);
    while let Some(page) = pages
        .try_next()
        .await
        .expect("Failed to fetch the next page")
    {
        let root: NetworksRoot =
            serde_json::from_value(page.body).expect("Unexpected response format");
        for net in root.networks {
            println!("ID = {}, Name = {}, Status = {}", net.id, net.name, net.status);
        }
    }
    println!("Done listing");
}
