//! Servicio local del portal judicial Marduk Ecosystem: búsqueda sobre el
//! sitemap de soluciones, cliente IA con modo demostración y generador de
//! soluciones por plantillas.

pub mod ai;
pub mod api;
pub mod app_state;
pub mod assist;
pub mod config;
pub mod generator;
pub mod heuristics;
pub mod llm;
pub mod models;
pub mod roles;
pub mod search;
pub mod sitemap;
pub mod storage;
pub mod view;
