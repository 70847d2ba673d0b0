use glam::{IVec3, Vec3};

/// Face direction of an axis-aligned cell or box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Top,    // +Y
    Bottom, // -Y
    Left,   // -X
    Right,  // +X
    Front,  // +Z
    Back,   // -Z
}

impl Face {
    /// All six faces in order
    pub const ALL: [Face; 6] = [
        Face::Top,
        Face::Bottom,
        Face::Left,
        Face::Right,
        Face::Front,
        Face::Back,
    ];

    /// Stable index of this face in [`Face::ALL`]
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Face::Top => 0,
            Face::Bottom => 1,
            Face::Left => 2,
            Face::Right => 3,
            Face::Front => 4,
            Face::Back => 5,
        }
    }

    /// Integer offset to the neighbouring cell across this face
    #[inline]
    pub fn normal(self) -> IVec3 {
        match self {
            Face::Top => IVec3::Y,
            Face::Bottom => IVec3::NEG_Y,
            Face::Left => IVec3::NEG_X,
            Face::Right => IVec3::X,
            Face::Front => IVec3::Z,
            Face::Back => IVec3::NEG_Z,
        }
    }

    /// The face pointing the other way
    #[inline]
    pub fn opposite(self) -> Face {
        match self {
            Face::Top => Face::Bottom,
            Face::Bottom => Face::Top,
            Face::Left => Face::Right,
            Face::Right => Face::Left,
            Face::Front => Face::Back,
            Face::Back => Face::Front,
        }
    }

    /// Axis the face is perpendicular to (0 = X, 1 = Y, 2 = Z)
    #[inline]
    pub fn axis(self) -> usize {
        match self {
            Face::Left | Face::Right => 0,
            Face::Top | Face::Bottom => 1,
            Face::Front | Face::Back => 2,
        }
    }

    /// Project a position onto the plane of this face
    ///
    /// X faces map to (y, z), Y faces to (x, z), Z faces to (x, y).
    #[inline]
    pub fn project(self, p: IVec3) -> (i32, i32) {
        match self.axis() {
            0 => (p.y, p.z),
            1 => (p.x, p.z),
            _ => (p.x, p.y),
        }
    }

    /// Inverse of [`Face::project`]: rebuild a position from plane coordinates and depth
    #[inline]
    pub fn unproject(self, u: i32, v: i32, depth: i32) -> IVec3 {
        match self.axis() {
            0 => IVec3::new(depth, u, v),
            1 => IVec3::new(u, depth, v),
            _ => IVec3::new(u, v, depth),
        }
    }

    /// Four corners of this face of the box `[min, max]`, counter-clockwise viewed from outside
    #[inline]
    pub fn box_vertices(self, min: Vec3, max: Vec3) -> [Vec3; 4] {
        let (x0, y0, z0) = (min.x, min.y, min.z);
        let (x1, y1, z1) = (max.x, max.y, max.z);
        match self {
            Face::Top => [
                Vec3::new(x0, y1, z0),
                Vec3::new(x0, y1, z1),
                Vec3::new(x1, y1, z1),
                Vec3::new(x1, y1, z0),
            ],
            Face::Bottom => [
                Vec3::new(x0, y0, z0),
                Vec3::new(x1, y0, z0),
                Vec3::new(x1, y0, z1),
                Vec3::new(x0, y0, z1),
            ],
            Face::Left => [
                Vec3::new(x0, y0, z1),
                Vec3::new(x0, y1, z1),
                Vec3::new(x0, y1, z0),
                Vec3::new(x0, y0, z0),
            ],
            Face::Right => [
                Vec3::new(x1, y0, z0),
                Vec3::new(x1, y1, z0),
                Vec3::new(x1, y1, z1),
                Vec3::new(x1, y0, z1),
            ],
            Face::Front => [
                Vec3::new(x1, y0, z1),
                Vec3::new(x1, y1, z1),
                Vec3::new(x0, y1, z1),
                Vec3::new(x0, y0, z1),
            ],
            Face::Back => [
                Vec3::new(x0, y0, z0),
                Vec3::new(x0, y1, z0),
                Vec3::new(x1, y1, z0),
                Vec3::new(x1, y0, z0),
            ],
        }
    }

    /// Iterator over all faces
    #[inline]
    pub fn iter() -> impl Iterator<Item = Face> {
        Self::ALL.iter().copied()
    }
}
