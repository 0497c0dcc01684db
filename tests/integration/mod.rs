// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod credential_pool_test;
pub mod execution_log_repository_test;
pub mod generate_content_test;
pub mod helpers;
pub mod scheduler_test;
pub mod work_template_repository_test;
