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

use neutronclient::ErrorKind;
use serde_json::Value;

fn main() {
    env_logger::init();
    let id = env::args().nth(1).expect("Provide a network ID");

    let mut session = neutronclient::sync::SyncSession::from_env()
        .expect("Failed to create a session from the environment");

    match session.get::<Value>(&format!("/networks/{}", id)) {
        Ok(resp) => {
            println!("{:#}", resp.body["network"]);
            println!("Request IDs: {:?}", resp.request_ids);
        }
        Err(e) if e.kind() == ErrorKind::NetworkNotFound => {
            println!("Network {} does not exist", id);
        }
        Err(e) => panic!("Failed: {}", e),
    }
}
