diesel::table! {
    legal_documents (id) {
        id -> Uuid,
        slug -> Text,
        title -> Text,
        content -> Text,
        document_type -> Text,
        version -> Text,
        effective_date -> Timestamptz,
        is_active -> Bool,
        requires_acceptance -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    legal_acceptances (id) {
        id -> Uuid,
        user_id -> Uuid,
        document_id -> Uuid,
        document_version -> Text,
        accepted_at -> Timestamptz,
        ip_address -> Nullable<Text>,
        user_agent -> Nullable<Text>,
    }
}

diesel::table! {
    legal_disagreements (id) {
        id -> Uuid,
        user_id -> Uuid,
        profile_id -> Nullable<Uuid>,
        church_id -> Nullable<Uuid>,
        document_type -> Text,
        disagreement_type -> Text,
        status -> Text,
        deadline_at -> Timestamptz,
        warning_sent_at -> Nullable<Timestamptz>,
        processed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        email -> Text,
        password_hash -> Text,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    profiles (id) {
        id -> Uuid,
        user_id -> Uuid,
        church_id -> Nullable<Uuid>,
        display_name -> Text,
        first_name -> Nullable<Text>,
        last_name -> Nullable<Text>,
        email -> Nullable<Text>,
        phone -> Nullable<Text>,
        avatar_url -> Nullable<Text>,
        address -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    churches (id) {
        id -> Uuid,
        name -> Text,
        slug -> Text,
        owner_id -> Uuid,
        is_active -> Bool,
        deleted_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    church_members (id) {
        id -> Uuid,
        church_id -> Uuid,
        user_id -> Uuid,
        role -> Text,
        joined_at -> Timestamptz,
    }
}

diesel::table! {
    notifications (id) {
        id -> Uuid,
        user_id -> Uuid,
        kind -> Text,
        title -> Text,
        body -> Text,
        read_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    legal_documents,
    legal_acceptances,
    legal_disagreements,
    users,
    profiles,
    churches,
    church_members,
    notifications,
);
