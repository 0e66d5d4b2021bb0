//! Roles de usuario y datos de los paneles por rol.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Funcionario,
    #[default]
    Ciudadano,
    Administrador,
    Desarrollador,
    Investigador,
    Estudiante,
}

impl UserRole {
    pub const ALL: [UserRole; 6] = [
        UserRole::Funcionario,
        UserRole::Ciudadano,
        UserRole::Administrador,
        UserRole::Desarrollador,
        UserRole::Investigador,
        UserRole::Estudiante,
    ];

    /// Interpreta el rol; cualquier valor desconocido devuelve el rol por defecto.
    pub fn parse(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim().to_lowercase())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Funcionario => "funcionario",
            UserRole::Ciudadano => "ciudadano",
            UserRole::Administrador => "administrador",
            UserRole::Desarrollador => "desarrollador",
            UserRole::Investigador => "investigador",
            UserRole::Estudiante => "estudiante",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub label: &'static str,
    pub value: &'static str,
    pub trend: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub earned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gamification {
    pub level: u32,
    pub xp: u32,
    pub next_level_xp: u32,
}

impl Gamification {
    /// Progreso hacia el siguiente nivel, entre 0 y 100.
    pub fn progress_percent(&self) -> u32 {
        if self.next_level_xp == 0 {
            return 100;
        }
        (self.xp.saturating_mul(100) / self.next_level_xp).min(100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataset {
    pub label: &'static str,
    pub data: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<&'static str>,
    pub datasets: Vec<ChartDataset>,
}

/// Datos del panel de un rol, enlazados por nombre de campo.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDashboard {
    pub role: UserRole,
    pub title: &'static str,
    pub welcome: &'static str,
    pub metrics: Vec<Metric>,
    pub badges: Vec<Badge>,
    pub gamification: Gamification,
    pub progress_percent: u32,
    pub chart: ChartData,
}

const MONTHS: [&str; 6] = ["Ene", "Feb", "Mar", "Abr", "May", "Jun"];

fn metric(label: &'static str, value: &'static str, trend: &'static str) -> Metric {
    Metric { label, value, trend }
}

fn badge(id: &'static str, name: &'static str, earned: bool) -> Badge {
    Badge { id, name, earned }
}

pub fn dashboard_for(role: UserRole) -> RoleDashboard {
    let (title, welcome, metrics, badges, gamification, series) = match role {
        UserRole::Funcionario => (
            "Panel del funcionario judicial",
            "Gestione sus expedientes y herramientas de trabajo.",
            vec![
                metric("Expedientes activos", "128", "+4%"),
                metric("Plazos esta semana", "17", "-2%"),
                metric("Herramientas en uso", "6", "+1"),
            ],
            vec![badge("primer-expediente", "Primer expediente digital", true), badge("eficiencia", "Eficiencia procesal", false)],
            Gamification { level: 4, xp: 1_250, next_level_xp: 2_000 },
            ("Expedientes resueltos", vec![32, 41, 38, 45, 50, 47]),
        ),
        UserRole::Ciudadano => (
            "Mi portal ciudadano",
            "Consulte sus trámites y encuentre orientación.",
            vec![
                metric("Trámites en curso", "2", "0"),
                metric("Citas programadas", "1", "+1"),
                metric("Consultas respondidas", "5", "+2"),
            ],
            vec![badge("registro", "Registro completado", true), badge("participacion", "Participación comunitaria", false)],
            Gamification { level: 1, xp: 120, next_level_xp: 500 },
            ("Consultas realizadas", vec![1, 0, 2, 1, 3, 2]),
        ),
        UserRole::Administrador => (
            "Consola de administración",
            "Supervise el ecosistema y sus usuarios.",
            vec![
                metric("Usuarios activos", "3.412", "+6%"),
                metric("Soluciones publicadas", "84", "+3"),
                metric("Incidencias abiertas", "9", "-12%"),
            ],
            vec![badge("guardian", "Guardián del ecosistema", true), badge("auditor", "Auditoría completa", true)],
            Gamification { level: 9, xp: 8_900, next_level_xp: 10_000 },
            ("Usuarios activos (cientos)", vec![25, 27, 29, 30, 32, 34]),
        ),
        UserRole::Desarrollador => (
            "Espacio del desarrollador",
            "Publique y mantenga soluciones para la comunidad.",
            vec![
                metric("Soluciones mantenidas", "7", "+1"),
                metric("Contribuciones", "152", "+18%"),
                metric("Issues abiertos", "11", "-3"),
            ],
            vec![badge("primer-pr", "Primera contribución", true), badge("mentor", "Mentor de la comunidad", false)],
            Gamification { level: 6, xp: 3_400, next_level_xp: 5_000 },
            ("Contribuciones", vec![18, 22, 25, 21, 30, 36]),
        ),
        UserRole::Investigador => (
            "Laboratorio de investigación",
            "Explore datos y jurisprudencia del ecosistema.",
            vec![
                metric("Conjuntos de datos", "23", "+2"),
                metric("Consultas analíticas", "310", "+9%"),
                metric("Publicaciones", "4", "+1"),
            ],
            vec![badge("explorador", "Explorador de datos", true), badge("publicacion", "Primera publicación", true)],
            Gamification { level: 5, xp: 2_700, next_level_xp: 4_000 },
            ("Consultas analíticas", vec![40, 52, 48, 61, 55, 54]),
        ),
        UserRole::Estudiante => (
            "Aula virtual",
            "Aprenda sobre justicia digital con casos reales.",
            vec![
                metric("Cursos completados", "3", "+1"),
                metric("Horas de estudio", "42", "+5"),
                metric("Retos superados", "8", "+2"),
            ],
            vec![badge("aprendiz", "Aprendiz digital", true), badge("investigador-junior", "Investigador junior", false)],
            Gamification { level: 2, xp: 640, next_level_xp: 1_000 },
            ("Horas de estudio", vec![4, 6, 8, 7, 9, 8]),
        ),
    };

    let (series_label, data) = series;
    let progress_percent = gamification.progress_percent();
    RoleDashboard {
        role,
        title,
        welcome,
        metrics,
        badges,
        gamification,
        progress_percent,
        chart: ChartData {
            labels: MONTHS.to_vec(),
            datasets: vec![ChartDataset { label: series_label, data }],
        },
    }
}
