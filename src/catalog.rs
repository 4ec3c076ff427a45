use serde::Serialize;

use crate::models::{AddonSelection, ServiceSelection};

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub duration_minutes: u32,
    pub price: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Addon {
    pub id: &'static str,
    pub name: &'static str,
    pub price: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Therapist {
    pub id: &'static str,
    pub name: &'static str,
}

pub fn services() -> Vec<Service> {
    vec![
        Service {
            id: "swedish",
            name: "Swedish Massage",
            description: "Gentle full-body massage for relaxation and circulation.",
            duration_minutes: 60,
            price: 90,
        },
        Service {
            id: "deep-tissue",
            name: "Deep Tissue Massage",
            description: "Focused pressure for chronic tension and knots.",
            duration_minutes: 60,
            price: 110,
        },
        Service {
            id: "hot-stone",
            name: "Hot Stone Therapy",
            description: "Heated basalt stones to melt away deep muscle stress.",
            duration_minutes: 75,
            price: 120,
        },
        Service {
            id: "aromatherapy",
            name: "Aromatherapy Massage",
            description: "Essential-oil massage tuned to your mood.",
            duration_minutes: 60,
            price: 95,
        },
        Service {
            id: "prenatal",
            name: "Prenatal Massage",
            description: "Safe, supportive care for mothers-to-be.",
            duration_minutes: 60,
            price: 100,
        },
        Service {
            id: "reflexology",
            name: "Reflexology",
            description: "Pressure-point foot treatment for whole-body balance.",
            duration_minutes: 45,
            price: 80,
        },
    ]
}

pub fn addons() -> Vec<Addon> {
    vec![
        Addon {
            id: "hot-stones",
            name: "Hot Stones",
            price: 20,
        },
        Addon {
            id: "aromatherapy-oil",
            name: "Aromatherapy Oil",
            price: 15,
        },
        Addon {
            id: "scalp-massage",
            name: "Scalp Massage",
            price: 15,
        },
        Addon {
            id: "extra-time",
            name: "Extra 15 Minutes",
            price: 25,
        },
    ]
}

pub fn therapists() -> Vec<Therapist> {
    vec![
        Therapist {
            id: "sarah",
            name: "Sarah Chen",
        },
        Therapist {
            id: "marcus",
            name: "Marcus Webb",
        },
        Therapist {
            id: "elena",
            name: "Elena Rossi",
        },
    ]
}

pub fn find_service(id: &str) -> Option<ServiceSelection> {
    services().into_iter().find(|s| s.id == id).map(|s| ServiceSelection {
        id: s.id.to_string(),
        name: s.name.to_string(),
        duration_minutes: s.duration_minutes,
        price: s.price,
    })
}

pub fn find_addon(id: &str) -> Option<AddonSelection> {
    addons().into_iter().find(|a| a.id == id).map(|a| AddonSelection {
        id: a.id.to_string(),
        name: a.name.to_string(),
        price: a.price,
    })
}

pub fn therapist_name(id: &str) -> Option<&'static str> {
    therapists().into_iter().find(|t| t.id == id).map(|t| t.name)
}
