//! Navigation targets of the clinic shell.

/// A screen of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Dashboard,
    AddPatient,
    ManagePatient,
    AddGeneralData,
    ManageGeneralData,
    AddHealthData,
    ManageHealthData,
    AddBill,
    ManageBill,
}

impl Route {
    pub const ALL: [Route; 9] = [
        Route::Dashboard,
        Route::AddPatient,
        Route::ManagePatient,
        Route::AddGeneralData,
        Route::ManageGeneralData,
        Route::AddHealthData,
        Route::ManageHealthData,
        Route::AddBill,
        Route::ManageBill,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Dashboard => "/dashboard",
            Route::AddPatient => "/add-patient",
            Route::ManagePatient => "/manage-patient",
            Route::AddGeneralData => "/add-general-data",
            Route::ManageGeneralData => "/manage-general-data",
            Route::AddHealthData => "/add-health-data",
            Route::ManageHealthData => "/manage-health-data",
            Route::AddBill => "/add-bill",
            Route::ManageBill => "/manage-bill",
        }
    }

    /// Resolve a path. The root path opens the dashboard.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            return Some(Route::Dashboard);
        }
        Route::ALL.into_iter().find(|route| route.path() == path)
    }

    /// Sidebar label.
    pub fn label(&self) -> &'static str {
        match self {
            Route::Dashboard => "Dashboard",
            Route::AddPatient => "Add Patient",
            Route::ManagePatient => "Manage Patient",
            Route::AddGeneralData => "Add General Data",
            Route::ManageGeneralData => "Manage General Data",
            Route::AddHealthData => "Add Health Data",
            Route::ManageHealthData => "Manage Health Data",
            Route::AddBill => "Add Bill",
            Route::ManageBill => "Manage Bill",
        }
    }
}
