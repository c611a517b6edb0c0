// Copyright 2024 tison <wander4096@gmail.com>
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

shadow_rs::shadow!(build);

/// A single-line version string combining the crate version with the build's
/// short commit hash, suitable for `--version` output and log banners.
pub const VERSION: &str = const_format::formatcp!("{}-{}", env!("CARGO_PKG_VERSION"), build::SHORT_COMMIT);

pub fn version() -> &'static str {
    VERSION
}
