// Copyright 2026 The Exchange Core Authors
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

use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("not found: {0}")]
	NotFound(String),
	#[error("duplicate key: {0}")]
	DuplicateKey(String),
	#[error("serialization conflict")]
	Conflict,
	#[error("internal store error: {0}")]
	Internal(String),
}

impl From<rusqlite::Error> for StoreError {
	fn from(err: rusqlite::Error) -> Self {
		match &err {
			rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(err.to_string()),
			rusqlite::Error::SqliteFailure(sqlite_err, msg) => match sqlite_err.code {
				// `ErrorCode::ConstraintViolation` is SQLite's primary result code and
				// covers UNIQUE, FOREIGN KEY, CHECK and NOT NULL alike; the extended
				// code disambiguates. A foreign-key violation means the referenced row
				// is missing, per `spec.md` §4.2 ("Foreign-key violations surface as
				// NotFound"); only UNIQUE/PRIMARY KEY violations are `DuplicateKey`.
				ErrorCode::ConstraintViolation
					if sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
					StoreError::NotFound(msg.clone().unwrap_or_else(|| err.to_string())),
				ErrorCode::ConstraintViolation =>
					StoreError::DuplicateKey(msg.clone().unwrap_or_else(|| err.to_string())),
				ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked =>
					StoreError::Conflict,
				_ => StoreError::Internal(err.to_string()),
			},
			_ => StoreError::Internal(err.to_string()),
		}
	}
}
