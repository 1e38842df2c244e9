diesel::table! {
    group_bridge_state (group_uuid) {
        group_uuid -> Text,
        enabled -> Bool,
        room_id -> Nullable<Text>,
        enabled_by -> Nullable<Text>,
        enabled_at -> Nullable<Timestamp>,
    }
}

// Read-only, Sim-owned tables. Not managed by this crate's migrations —
// consulted only for power-level computation and resync (distilled spec §6).
diesel::table! {
    os_groups_membership (GroupID, PrincipalID) {
        GroupID -> Text,
        PrincipalID -> Text,
        SelectedRoleID -> Text,
    }
}

diesel::table! {
    os_groups_roles (GroupID, RoleID) {
        GroupID -> Text,
        RoleID -> Text,
        Powers -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(group_bridge_state, os_groups_membership, os_groups_roles,);
