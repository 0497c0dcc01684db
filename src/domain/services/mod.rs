// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 凭证池服务（credential_pool_service）：凭证生命周期管理与轮换选择
pub mod credential_pool_service;
