use crate::import::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Users,
    Students,
    Teachers,
    Classes,
    Attendance,
    Events,
    Complaints,
    Fees,
    Subscriptions,
    Payments,
    BulkImport,
}

impl Screen {
    pub const ALL: [Screen; 12] = [
        Screen::Dashboard,
        Screen::Users,
        Screen::Students,
        Screen::Teachers,
        Screen::Classes,
        Screen::Attendance,
        Screen::Events,
        Screen::Complaints,
        Screen::Fees,
        Screen::Subscriptions,
        Screen::Payments,
        Screen::BulkImport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Screen::Dashboard => "dashboard",
            Screen::Users => "users",
            Screen::Students => "students",
            Screen::Teachers => "teachers",
            Screen::Classes => "classes",
            Screen::Attendance => "attendance",
            Screen::Events => "events",
            Screen::Complaints => "complaints",
            Screen::Fees => "fees",
            Screen::Subscriptions => "subscriptions",
            Screen::Payments => "payments",
            Screen::BulkImport => "bulkImport",
        }
    }
}

pub fn can_access(role: Role, screen: Screen) -> bool {
    use Screen::*;
    match role {
        Role::SchoolAdmin => true,
        Role::Principal => !matches!(screen, Subscriptions | Payments),
        Role::Teacher => matches!(
            screen,
            Dashboard | Students | Classes | Attendance | Events | Complaints
        ),
        Role::Student | Role::Parent => {
            matches!(screen, Dashboard | Attendance | Events | Complaints | Fees)
        }
        Role::FinanceOfficer => {
            matches!(screen, Dashboard | Students | Fees | Payments | Subscriptions)
        }
        Role::SupportStaff => matches!(screen, Dashboard | Events | Complaints),
    }
}

pub fn allowed_screens(role: Role) -> Vec<Screen> {
    Screen::ALL
        .into_iter()
        .filter(|s| can_access(role, *s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admins_and_principals_import_users() {
        let importers = Role::ALL
            .into_iter()
            .filter(|r| can_access(*r, Screen::BulkImport))
            .collect::<Vec<_>>();
        assert_eq!(importers, vec![Role::SchoolAdmin, Role::Principal]);
    }

    #[test]
    fn every_role_sees_the_dashboard() {
        for role in Role::ALL {
            assert_eq!(allowed_screens(role).first(), Some(&Screen::Dashboard));
        }
    }
}
