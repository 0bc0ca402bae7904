/// Newton-Raphson power flow options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PFOpt {
    // Termination tolerance on the per unit P & Q mismatch (infinity norm).
    // Default value is 1e-6.
    pub tolerance: f64,

    // Maximum number of Newton iterations. Default value is 20.
    pub max_it: usize,

    // Print the mismatch norm at each iteration.
    pub verbose: bool,
}

impl Default for PFOpt {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_it: 20,
            verbose: false,
        }
    }
}

/// Load sweep options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepOpt {
    // Bus (0-based) whose load is swept.
    pub bus: usize,

    // Active load range (p.u.), endpoints included.
    pub p_range: (f64, f64),

    // Reactive load range (p.u.), endpoints included.
    pub q_range: (f64, f64),

    // Number of grid points along each axis.
    pub points: usize,
}

impl Default for SweepOpt {
    fn default() -> Self {
        Self {
            bus: 1,
            p_range: (0.5, 2.0),
            q_range: (0.5, 2.0),
            points: 8,
        }
    }
}
