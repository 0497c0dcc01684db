// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含编排凭证池、熔断器与重试执行器的用例
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 基础设施模块
///
/// 提供数据库、仓库实现与指标导出
pub mod infrastructure;

/// 下游服务模块
///
/// 生成服务接口、HTTP 实现与熔断器
pub mod providers;

/// 工具模块
///
/// 提供重试执行器、错误类型与遥测初始化
pub mod utils;

/// 工作器模块
///
/// 实现单飞调度器与工作单元接口
pub mod workers;
